//! Transactional installer.
//!
//! An install places files through a [`Placer`], which journals every path it
//! creates or displaces into a [`Manifest`]. If any step fails the journal is
//! replayed backwards, so a failed install leaves the host as it found it.

use anyhow::Result;
use log::{error, warn};
use std::path::Path;

mod layout;
mod linux;
mod options;
mod placer;
mod rollback;
mod windows;

pub use layout::{Layout, LinuxLayout, WindowsLayout};
pub use options::{ConflictPolicy, ExecMode, InstallOptions};
pub use placer::{Placer, backup_path};
pub use rollback::{RemoveStrategy, remove, rollback};

use crate::package::{Manifest, Package};
use crate::runtime::Runtime;

/// Install the extracted tree at `extracted_root` for `pkg`.
///
/// Returns the manifest of everything placed. On failure every recorded path
/// is undone before the error is returned; a failing undo is logged and does
/// not replace the original error.
#[tracing::instrument(skip(runtime, layout, pkg, options))]
pub fn install<R: Runtime>(
    runtime: &R,
    layout: &Layout,
    extracted_root: &Path,
    pkg: &Package,
    options: &InstallOptions,
) -> Result<Manifest> {
    let pattern = layout.binary_pattern(pkg);
    let mut placer = Placer::new(runtime, options);
    let result = match layout {
        Layout::Linux(linux) => linux.install(&mut placer, extracted_root, pkg, &pattern),
        Layout::Windows(windows) => windows.install(&mut placer, extracted_root, pkg, &pattern),
    };

    match result {
        Ok(()) => Ok(placer.commit()),
        Err(e) => {
            if !options.is_dry_run() {
                warn!("Installing {} failed, rolling back: {:#}", pkg.name(), e);
                if let Err(undo) = rollback(runtime, placer.manifest()) {
                    error!("Rollback incomplete: {:#}", undo);
                }
            }
            Err(e)
        }
    }
}
