//! Installing into the per-package directory layout used on Windows hosts.

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::layout::WindowsLayout;
use super::placer::Placer;
use super::rollback::ensure_managed;
use crate::package::Package;
use crate::runtime::path::{windows_to_posix_shell, windows_to_wsl};
use crate::runtime::Runtime;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Batch launcher forwarding every argument.
fn cmd_launcher(target: &str) -> String {
    format!("@echo off\r\n\"{}\" %*\r\n", target)
}

/// Launcher for POSIX shells running on Windows (Git Bash, MSYS) and for WSL.
fn sh_launcher(target: &str) -> String {
    format!(
        "#!/bin/sh\nif [ \"$(uname)\" != \"Linux\" ]; then\n    \"{}\" \"$@\"\nelse\n    \"{}\" \"$@\"\nfi\n",
        windows_to_posix_shell(target),
        windows_to_wsl(target)
    )
}

impl WindowsLayout {
    /// Copy the tree at `root` into `app/<name>` and put launchers for every
    /// executable matching `binary_pattern` into `bin`.
    ///
    /// Directories recorded by a previous install of `pkg` are set aside first
    /// so files dropped by the new release do not linger. They come back if
    /// the install fails.
    pub fn install<R: Runtime>(
        &self,
        placer: &mut Placer<'_, R>,
        root: &Path,
        pkg: &Package,
        binary_pattern: &str,
    ) -> Result<()> {
        let runtime = placer.runtime();
        let pattern = Pattern::new(binary_pattern)
            .with_context(|| format!("Invalid binary name `{}`", binary_pattern))?;

        // Shared by every package, so never recorded.
        if !placer.is_dry_run() {
            runtime.create_dir_all(&self.app_dir())?;
            runtime.create_dir_all(&self.bin_dir())?;
        }

        let previous = pkg.installed_files();
        ensure_managed(previous, self.root())?;
        for dir in previous.iter() {
            placer.set_aside_dir(dir)?;
        }

        let app = self.package_dir(pkg.name());
        placer.merge_dir(root, &app, &HashSet::new())?;

        let binaries: Vec<PathBuf> = executables(runtime, root)?
            .into_iter()
            .filter(|f| {
                f.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| pattern.matches_with(n, MATCH_OPTIONS))
            })
            .collect();
        if binaries.is_empty() {
            warn!("No binary file found, please check the release package.");
            return Ok(());
        }

        for bin in binaries {
            let Ok(relative) = bin.strip_prefix(root) else {
                continue;
            };
            let target = app.join(relative);
            let Some(stem) = target.file_stem().map(|s| s.to_os_string()) else {
                continue;
            };
            self.write_launchers(placer, &target, &stem.to_string_lossy())?;
        }

        // Launchers are only useful once `bin` is on PATH.
        if !placer.is_dry_run()
            && let Err(e) = runtime.ensure_user_path(&self.bin_dir())
        {
            warn!("Could not add {:?} to PATH: {:#}", self.bin_dir(), e);
        }
        Ok(())
    }

    fn write_launchers<R: Runtime>(
        &self,
        placer: &mut Placer<'_, R>,
        target: &Path,
        stem: &str,
    ) -> Result<()> {
        let bin = self.bin_dir();
        let target_str = target.to_string_lossy();
        info!("Creating launchers for {:?}", target);

        placer.create_shortcut(target, &bin.join(format!("{}.lnk", stem)))?;
        placer.write_file(
            &bin.join(format!("{}.cmd", stem)),
            cmd_launcher(&target_str).as_bytes(),
            None,
        )?;
        placer.write_file(&bin.join(stem), sh_launcher(&target_str).as_bytes(), None)?;
        Ok(())
    }
}

/// Files under `dir`, depth first in path order.
fn executables<R: Runtime>(runtime: &R, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in runtime.read_dir(dir)? {
        if runtime.is_dir(&entry) {
            files.extend(executables(runtime, &entry)?);
        } else if runtime.is_file(&entry) {
            files.push(entry);
        }
    }
    Ok(files)
}
