use anyhow::Result;

use super::Config;
use crate::{
    error::BpmError, install::Layout, package::Registry, runtime::Runtime,
    source::ReleaseSource,
};

/// Rename the launchers called `old_name` to `new_name`.
///
/// Launchers only exist in the Windows layout; elsewhere this is refused.
#[tracing::instrument(skip(config))]
pub fn alias<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    old_name: &str,
    new_name: &str,
) -> Result<()> {
    let Layout::Windows(windows) = &config.layout else {
        return Err(BpmError::InvalidOptions(
            "alias is only supported on Windows, where bpm manages launchers".into(),
        )
        .into());
    };
    config.ensure_privileged()?;
    let mut registry = Registry::load(&config.runtime, &config.registry_path())?;
    let renamed = registry.alias(&windows.bin_dir(), old_name, new_name)?;
    println!("   renamed {} launcher(s): {} -> {}", renamed, old_name, new_name);
    Ok(())
}
