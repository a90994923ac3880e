use anyhow::Result;
use log::debug;

use super::{Config, Tally};
use crate::{
    error::BpmError,
    install::{self, ExecMode},
    package::Registry,
    runtime::Runtime,
    source::ReleaseSource,
};

/// Uninstall packages by name.
///
/// `soft` drops the registry entry and leaves the files on disk. Unknown
/// names are reported and the rest of the batch still runs.
#[tracing::instrument(skip(config))]
pub fn remove<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    names: &[String],
    soft: bool,
    dry_run: bool,
) -> Result<()> {
    let mode = if dry_run {
        ExecMode::DryRun
    } else {
        config.ensure_privileged()?;
        ExecMode::Apply
    };
    let mut registry = Registry::load(&config.runtime, &config.registry_path())?;

    let mut tally = Tally::default();
    for name in names {
        match remove_one(config, &mut registry, name, soft, mode) {
            Ok(()) => tally.success(),
            Err(e) => tally.failure(name, &e),
        }
    }
    tally.finish("Remove")
}

fn remove_one<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    registry: &mut Registry<'_, R>,
    name: &str,
    soft: bool,
    mode: ExecMode,
) -> Result<()> {
    let Some(pkg) = registry.find(name).1 else {
        return Err(BpmError::PackageNotFound(name.to_string()).into());
    };

    if soft {
        debug!("Soft removal of {}, keeping {} file(s)", name, pkg.installed_files().len());
    } else {
        install::remove(
            &config.runtime,
            pkg.installed_files(),
            &config.layout.remove_strategy(),
            mode,
        )?;
    }

    if mode == ExecMode::DryRun {
        println!("   dry run: {} would be removed", name);
        return Ok(());
    }
    registry.remove(name)?;
    println!("   removed {}", name);
    Ok(())
}
