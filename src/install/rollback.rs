//! Undoing installs: transaction rollback and package removal.

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::ExecMode;
use super::placer::backup_path;
use crate::error::BpmError;
use crate::package::Manifest;
use crate::runtime::{Runtime, is_path_under};

/// How an uninstall disposes of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveStrategy {
    /// Undo like a rollback, putting `.old` backups back in place.
    Restore,
    /// Delete every path outright; nothing outside `root` may be touched.
    Purge { root: PathBuf },
}

/// Walk `manifest` newest-first, deleting what the install created and
/// restoring displaced `.old` files. Directories go only once empty.
///
/// Every path is attempted; failures are logged and reported together.
pub fn rollback<R: Runtime>(runtime: &R, manifest: &Manifest) -> Result<()> {
    let mut failed = 0;
    for path in manifest.iter_rev() {
        if let Err(e) = undo_one(runtime, path) {
            warn!("Failed to restore {:?}: {:#}", path, e);
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(anyhow!("{} path(s) could not be restored", failed));
    }
    Ok(())
}

fn undo_one<R: Runtime>(runtime: &R, path: &Path) -> Result<()> {
    if runtime.is_dir(path) {
        if !runtime.read_dir(path)?.is_empty() {
            debug!("keeping non-empty directory {:?}", path);
            return Ok(());
        }
        runtime.remove_dir(path)?;
        info!("deleting {:?}", path);
    } else if runtime.exists(path) {
        runtime.remove_file(path)?;
        info!("deleting {:?}", path);
    }

    let backup = backup_path(path);
    if runtime.exists(&backup) {
        runtime.rename(&backup, path)?;
        info!("restoring {:?} -> {:?}", backup, path);
    }
    Ok(())
}

/// Uninstall the paths of `manifest`.
pub fn remove<R: Runtime>(
    runtime: &R,
    manifest: &Manifest,
    strategy: &RemoveStrategy,
    mode: ExecMode,
) -> Result<()> {
    if let RemoveStrategy::Purge { root } = strategy {
        ensure_managed(manifest, root)?;
    }

    if mode == ExecMode::DryRun {
        for path in manifest.iter() {
            info!("dry run: remove {:?}", path);
        }
        return Ok(());
    }

    match strategy {
        RemoveStrategy::Restore => rollback(runtime, manifest),
        RemoveStrategy::Purge { .. } => {
            for path in manifest.iter_rev() {
                purge_one(runtime, path)?;
            }
            Ok(())
        }
    }
}

fn purge_one<R: Runtime>(runtime: &R, path: &Path) -> Result<()> {
    if runtime.is_dir(path) {
        runtime.remove_dir_all(path)?;
        info!("Remove dir {:?}.", path);
    } else if runtime.exists(path) {
        runtime.remove_file(path)?;
        info!("Remove {:?}.", path);
    }
    Ok(())
}

/// Every path must sit inside `root` before anything is deleted.
pub(super) fn ensure_managed(manifest: &Manifest, root: &Path) -> Result<()> {
    match manifest.iter().find(|p| !is_path_under(p, root)) {
        Some(path) => Err(BpmError::UnsafeRemoval {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        }
        .into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_rollback_restores_backup_and_prunes_empty_dirs() -> Result<()> {
        let dir = tempdir()?;
        let bin = dir.path().join("bin");
        fs::create_dir(&bin)?;
        fs::write(bin.join("foo"), "new")?;
        fs::write(bin.join("foo.old"), "old")?;
        let share = dir.path().join("share");
        fs::create_dir(&share)?;
        fs::write(share.join("foo.1"), "man")?;

        let manifest = Manifest::from(vec![bin.join("foo"), share.clone(), share.join("foo.1")]);
        rollback(&RealRuntime, &manifest)?;

        assert_eq!(fs::read_to_string(bin.join("foo"))?, "old");
        assert!(!bin.join("foo.old").exists());
        assert!(!share.exists());
        Ok(())
    }

    #[test]
    fn test_rollback_keeps_non_empty_dirs_and_tolerates_missing() -> Result<()> {
        let dir = tempdir()?;
        let shared = dir.path().join("shared");
        fs::create_dir(&shared)?;
        fs::write(shared.join("someone-else"), "x")?;

        let manifest = Manifest::from(vec![shared.clone(), shared.join("already-gone")]);
        rollback(&RealRuntime, &manifest)?;

        assert!(shared.join("someone-else").exists());
        Ok(())
    }

    #[test]
    fn test_rollback_continues_after_failure() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| false);
        runtime
            .expect_exists()
            .returning(|p| !p.to_string_lossy().ends_with(".old"));
        runtime
            .expect_remove_file()
            .withf(|p| p == Path::new("/x/b"))
            .returning(|_| Err(anyhow!("busy")));
        runtime
            .expect_remove_file()
            .withf(|p| p == Path::new("/x/a"))
            .times(1)
            .returning(|_| Ok(()));

        let manifest = Manifest::from(vec![PathBuf::from("/x/a"), PathBuf::from("/x/b")]);
        assert!(rollback(&runtime, &manifest).is_err());
    }

    #[test]
    fn test_purge_refuses_paths_outside_root() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("bpm");
        let outside = dir.path().join("elsewhere");
        fs::create_dir_all(&root)?;
        fs::write(&outside, "keep")?;
        fs::write(root.join("inside"), "x")?;

        let manifest = Manifest::from(vec![root.join("inside"), outside.clone()]);
        let err = remove(
            &RealRuntime,
            &manifest,
            &RemoveStrategy::Purge { root: root.clone() },
            ExecMode::Apply,
        )
        .unwrap_err();

        assert!(matches!(
            error::kind(&err),
            Some(BpmError::UnsafeRemoval { .. })
        ));
        assert!(outside.exists());
        assert!(root.join("inside").exists());
        Ok(())
    }

    #[test]
    fn test_purge_deletes_trees_and_files() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().to_path_buf();
        let app = root.join("app/eza");
        fs::create_dir_all(&app)?;
        fs::write(app.join("eza.exe"), "MZ")?;
        fs::create_dir_all(root.join("bin"))?;
        fs::write(root.join("bin/eza.cmd"), "@echo off")?;

        let manifest = Manifest::from(vec![app.clone(), root.join("bin/eza.cmd")]);
        remove(
            &RealRuntime,
            &manifest,
            &RemoveStrategy::Purge { root: root.clone() },
            ExecMode::Apply,
        )?;

        assert!(!app.exists());
        assert!(!root.join("bin/eza.cmd").exists());
        assert!(root.join("bin").exists());
        Ok(())
    }

    #[test]
    fn test_rollback_restores_set_aside_directory() -> Result<()> {
        let dir = tempdir()?;
        let app = dir.path().join("app/eza");
        fs::create_dir_all(app.with_file_name("eza.old"))?;
        fs::write(app.with_file_name("eza.old").join("eza.exe"), "v1")?;
        fs::create_dir_all(&app)?;
        fs::write(app.join("eza.exe"), "v2")?;

        let manifest = Manifest::from(vec![app.clone(), app.join("eza.exe")]);
        rollback(&RealRuntime, &manifest)?;

        assert_eq!(fs::read_to_string(app.join("eza.exe"))?, "v1");
        assert!(!app.with_file_name("eza.old").exists());
        Ok(())
    }

    #[test]
    fn test_remove_dry_run_touches_nothing() -> Result<()> {
        let mut runtime = MockRuntime::new();
        runtime.expect_remove_file().never();
        runtime.expect_remove_dir().never();
        runtime.expect_remove_dir_all().never();
        runtime.expect_rename().never();

        let manifest = Manifest::from(vec![PathBuf::from("/usr/bin/foo")]);
        remove(&runtime, &manifest, &RemoveStrategy::Restore, ExecMode::DryRun)?;
        Ok(())
    }
}
