//! Placement primitives shared by every layout.
//!
//! Each mutation is appended to the manifest in the order it happens:
//! directories top-down before their contents, displaced backups before the
//! file that displaced them. Reverse replay of that journal is the rollback.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{ConflictPolicy, ExecMode, InstallOptions};
use crate::error::BpmError;
use crate::package::Manifest;
use crate::runtime::Runtime;

/// `<path>.old`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".old");
    path.with_file_name(name)
}

enum Content<'c> {
    Copy(&'c Path),
    Bytes(&'c [u8]),
    Shortcut(&'c Path),
}

pub struct Placer<'a, R: Runtime> {
    runtime: &'a R,
    policy: ConflictPolicy,
    mode: ExecMode,
    manifest: Manifest,
    /// Directories moved to `<dir>.old`, dropped on commit.
    set_aside: Vec<PathBuf>,
}

impl<'a, R: Runtime> Placer<'a, R> {
    pub fn new(runtime: &'a R, options: &InstallOptions) -> Self {
        Self {
            runtime,
            policy: options.policy,
            mode: options.mode,
            manifest: Manifest::new(),
            set_aside: Vec::new(),
        }
    }

    pub fn runtime(&self) -> &'a R {
        self.runtime
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecMode::DryRun
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Finish a successful install: delete the directories set aside by
    /// [`Placer::set_aside_dir`] and hand back the manifest.
    pub fn commit(self) -> Manifest {
        if self.apply() {
            for dir in &self.set_aside {
                let backup = backup_path(dir);
                match self.runtime.remove_dir_all(&backup) {
                    Ok(()) => info!("Remove dir {:?}.", backup),
                    Err(e) => warn!("Failed to remove {:?}: {:#}", backup, e),
                }
            }
        }
        self.manifest
    }

    fn apply(&self) -> bool {
        self.mode == ExecMode::Apply
    }

    /// Create `dir` and its missing ancestors, recording each one top-down.
    pub fn ensure_dir(&mut self, dir: &Path) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.as_os_str().is_empty() || self.runtime.is_dir(d) || self.manifest.contains(d) {
                break;
            }
            if self.runtime.exists(d) {
                return Err(BpmError::InstallFailure(format!("{:?} is not a directory", d)).into());
            }
            missing.push(d.to_path_buf());
            current = d.parent();
        }

        for d in missing.into_iter().rev() {
            // A stale backup would be restored over `d` on rollback.
            let backup = backup_path(&d);
            if self.runtime.exists(&backup) {
                self.displace(&backup)?;
                self.manifest.record(backup);
            }
            if self.apply() {
                self.runtime
                    .create_dir(&d)
                    .with_context(|| BpmError::InstallFailure(format!("cannot create {:?}", d)))?;
                debug!("mkdir {:?}", d);
            } else {
                info!("dry run: mkdir {:?}", d);
            }
            self.manifest.record(d);
        }
        Ok(())
    }

    /// Move `path` out of the way to `<path>.old`, shifting older backups first.
    fn displace(&mut self, path: &Path) -> Result<()> {
        let backup = backup_path(path);
        if self.runtime.exists(&backup) {
            self.displace(&backup)?;
            self.manifest.record(backup.clone());
        }
        if self.apply() {
            self.runtime.rename(path, &backup)?;
        }
        debug!("{:?} -> {:?}", path, backup);
        Ok(())
    }

    /// Move the existing directory `dir` to `<dir>.old` and start over with
    /// an empty one. Rollback puts the old tree back; [`Placer::commit`]
    /// deletes it.
    pub fn set_aside_dir(&mut self, dir: &Path) -> Result<()> {
        if !self.runtime.is_dir(dir) || self.set_aside.iter().any(|d| dir.starts_with(d)) {
            return Ok(());
        }
        self.displace(dir)?;
        self.manifest.record(dir);
        self.set_aside.push(dir.to_path_buf());
        if self.apply() {
            self.runtime
                .create_dir(dir)
                .with_context(|| BpmError::InstallFailure(format!("cannot create {:?}", dir)))?;
        }
        info!("Set aside {:?}", dir);
        Ok(())
    }

    /// Clear the destination `to` according to the conflict policy.
    fn prepare(&mut self, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            self.ensure_dir(parent)?;
        }
        if self.runtime.is_dir(to) {
            return Err(BpmError::InstallFailure(format!("{:?} is a directory", to)).into());
        }

        // A stale backup would be restored over `to` on rollback.
        let backup = backup_path(to);
        if self.runtime.exists(&backup) && !self.manifest.contains(to) {
            self.displace(&backup)?;
            self.manifest.record(backup);
        }

        if !self.runtime.exists(to) {
            return Ok(());
        }
        if self.policy == ConflictPolicy::Overwrite || self.manifest.contains(to) {
            if self.apply() {
                self.runtime.remove_file(to)?;
            }
            debug!("removed existing {:?}", to);
            Ok(())
        } else {
            self.displace(to)
        }
    }

    fn put(&mut self, content: Content<'_>, to: &Path, mode: Option<u32>) -> Result<()> {
        self.prepare(to)?;
        // Recorded before writing so a half-written file is still undone.
        self.manifest.record(to);
        if self.apply() {
            match content {
                Content::Copy(from) => {
                    self.runtime.copy(from, to)?;
                    info!("{:?} -> {:?}", from, to);
                }
                Content::Bytes(bytes) => {
                    self.runtime.write(to, bytes)?;
                    info!("Create {:?}", to);
                }
                Content::Shortcut(target) => {
                    self.runtime.create_shortcut(target, to)?;
                    info!("Create lnk: {:?} -> {:?}", target, to);
                }
            }
            if let Some(mode) = mode {
                self.runtime.set_permissions(to, mode)?;
            }
        } else {
            info!("dry run: install {:?}", to);
        }
        Ok(())
    }

    /// Copy one file to `to`, optionally forcing its permission bits.
    pub fn place_file(&mut self, from: &Path, to: &Path, mode: Option<u32>) -> Result<()> {
        self.put(Content::Copy(from), to, mode)
            .with_context(|| BpmError::InstallFailure(format!("cannot install {:?}", to)))
    }

    /// Write generated content (launcher scripts) to `to`.
    pub fn write_file(&mut self, to: &Path, contents: &[u8], mode: Option<u32>) -> Result<()> {
        self.put(Content::Bytes(contents), to, mode)
            .with_context(|| BpmError::InstallFailure(format!("cannot write {:?}", to)))
    }

    /// Create a shortcut at `link` that starts `target`.
    pub fn create_shortcut(&mut self, target: &Path, link: &Path) -> Result<()> {
        self.put(Content::Shortcut(target), link, None)
            .with_context(|| BpmError::InstallFailure(format!("cannot create {:?}", link)))
    }

    /// Mirror the tree under `from` into `to`, merging into existing directories.
    ///
    /// Files listed in `skip` were installed elsewhere already.
    pub fn merge_dir(&mut self, from: &Path, to: &Path, skip: &HashSet<PathBuf>) -> Result<()> {
        self.ensure_dir(to)?;
        for entry in self.runtime.read_dir(from)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let dest = to.join(name);
            if self.runtime.is_dir(&entry) {
                self.merge_dir(&entry, &dest, skip)?;
            } else if !skip.contains(&entry) {
                self.place_file(&entry, &dest, None)?;
            }
        }
        Ok(())
    }
}
