//! Persisted catalog of installed packages.
//!
//! The list is kept sorted by name at all times; every lookup is a binary
//! search, so entries are only ever added or dropped through [`Registry::insert`]
//! and [`Registry::remove`].

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::BpmError;
use crate::runtime::Runtime;

use super::Package;

/// File name of the registry under the configuration root.
pub const REGISTRY_FILE: &str = "bpm.json";

/// Launcher suffixes an alias renames, `""` being the extensionless shell script.
const LAUNCHER_SUFFIXES: &[&str] = &["lnk", "cmd", ""];

/// Number of launchers generated per binary.
const LAUNCHER_TRIAD: usize = 3;

pub struct Registry<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
    packages: Vec<Package>,
}

impl<'a, R: Runtime> Registry<'a, R> {
    /// Read the registry at `path`; a missing file is an empty registry.
    #[tracing::instrument(skip(runtime))]
    pub fn load(runtime: &'a R, path: &Path) -> Result<Self> {
        let mut packages: Vec<Package> = if runtime.exists(path) {
            let content = runtime
                .read_to_string(path)
                .with_context(|| format!("Failed to read registry {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse registry {:?}", path))?
        } else {
            debug!("No registry at {:?}, starting empty", path);
            Vec::new()
        };
        packages.sort_by(|a, b| a.name().cmp(b.name()));
        packages.dedup_by(|a, b| a.name() == b.name());

        Ok(Self {
            runtime,
            path: path.to_path_buf(),
            packages,
        })
    }

    /// Write the whole list, replacing the file only once the new content is on disk.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.packages)?;
        let tmp = self.path.with_extension("json.tmp");
        self.runtime
            .write(&tmp, content.as_bytes())
            .with_context(|| format!("Failed to save registry to {:?}", tmp))?;
        self.runtime
            .rename(&tmp, &self.path)
            .with_context(|| format!("Failed to save registry to {:?}", self.path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All packages, sorted by name.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Exact lookup. The index is the match position, or the insertion point when absent.
    pub fn find(&self, name: &str) -> (usize, Option<&Package>) {
        match self.packages.binary_search_by(|p| p.name().cmp(name)) {
            Ok(index) => (index, Some(&self.packages[index])),
            Err(index) => (index, None),
        }
    }

    /// Insert `pkg` at its sorted position, replacing a same-name entry, and persist.
    pub fn insert(&mut self, pkg: Package) -> Result<()> {
        match self.packages.binary_search_by(|p| p.name().cmp(pkg.name())) {
            Ok(index) => {
                debug!("Replacing registry entry `{}`", pkg.name());
                self.packages[index] = pkg;
            }
            Err(index) => self.packages.insert(index, pkg),
        }
        self.persist()
    }

    /// Drop the entry named `name` and persist. Absent names are an error.
    pub fn remove(&mut self, name: &str) -> Result<Package> {
        match self.find(name) {
            (index, Some(_)) => {
                let pkg = self.packages.remove(index);
                self.persist()?;
                Ok(pkg)
            }
            (_, None) => Err(BpmError::PackageNotFound(name.to_string()).into()),
        }
    }

    /// Rename the launchers in `launcher_dir` whose stem is `old_name` to
    /// `new_name`, across all packages. Installed files anywhere else are
    /// never touched.
    ///
    /// Stops after one full launcher set. Every rename is followed by a manifest
    /// rewrite and a persist. Returns the number of files renamed.
    pub fn alias(&mut self, launcher_dir: &Path, old_name: &str, new_name: &str) -> Result<usize> {
        if new_name.is_empty() || new_name.contains(['/', '\\']) || old_name == new_name {
            return Err(BpmError::InvalidOptions(format!(
                "cannot alias `{}` to `{}`",
                old_name, new_name
            ))
            .into());
        }

        let mut candidates: Vec<(usize, PathBuf)> = Vec::new();
        for (index, pkg) in self.packages.iter().enumerate() {
            for file in pkg.installed_files().iter() {
                if file.parent() == Some(launcher_dir)
                    && is_launcher_of(file, old_name)
                    && !self.runtime.is_dir(file)
                {
                    candidates.push((index, file.to_path_buf()));
                }
            }
        }
        if candidates.is_empty() {
            return Err(BpmError::LnkNotFound(old_name.to_string()).into());
        }

        let mut count = 0;
        for (index, path) in candidates {
            if count >= LAUNCHER_TRIAD {
                break;
            }
            if !self.runtime.exists(&path) {
                return Err(BpmError::LnkNotFound(path.display().to_string()).into());
            }
            let new_path = with_stem(&path, new_name);
            self.runtime.rename(&path, &new_path)?;
            self.packages[index]
                .installed_files_mut()
                .rewrite(&path, new_path.clone());
            self.persist()?;
            debug!("Renamed {:?} to {:?}", path, new_path);
            count += 1;
        }

        if count < LAUNCHER_TRIAD {
            warn!(
                "Only {} launcher(s) of `{}` renamed. Update bpm and reinstall the package to get cmd and sh support.",
                count, old_name
            );
        }
        Ok(count)
    }
}

fn is_launcher_of(path: &Path, stem: &str) -> bool {
    let suffix = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    path.file_stem().and_then(|s| s.to_str()) == Some(stem)
        && LAUNCHER_SUFFIXES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(suffix))
}

fn with_stem(path: &Path, stem: &str) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_file_name(format!("{}.{}", stem, ext)),
        None => path.with_file_name(stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use crate::package::Manifest;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::tempdir;

    fn pkg(name: &str) -> Package {
        Package::builder(name).build().unwrap()
    }

    fn names<R: Runtime>(registry: &Registry<R>) -> Vec<String> {
        registry
            .packages()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    #[test]
    fn test_insert_persist_and_reload_sorted() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("conf/bpm.json");
        let runtime = RealRuntime;

        let mut registry = Registry::load(&runtime, &path)?;
        assert!(registry.packages().is_empty());
        registry.insert(pkg("test_repo"))?;
        registry.insert(pkg("abc"))?;
        registry.insert(pkg("z"))?;

        let reloaded = Registry::load(&runtime, &path)?;
        assert_eq!(names(&reloaded), vec!["abc", "test_repo", "z"]);
        assert!(!path.with_extension("json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_find_exact_or_absent() -> Result<()> {
        let dir = tempdir()?;
        let runtime = RealRuntime;
        let mut registry = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        for name in ["b", "d", "f"] {
            registry.insert(pkg(name))?;
        }

        let (index, found) = registry.find("d");
        assert_eq!(index, 1);
        assert_eq!(found.map(Package::name), Some("d"));

        let (index, found) = registry.find("c");
        assert_eq!(index, 1);
        assert!(found.is_none());
        assert!(registry.find("dd").1.is_none());
        Ok(())
    }

    #[test]
    fn test_insert_same_name_replaces() -> Result<()> {
        let dir = tempdir()?;
        let runtime = RealRuntime;
        let mut registry = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        registry.insert(pkg("app"))?;
        let mut newer = pkg("app");
        newer.installed_files_mut().record("/usr/bin/app");
        registry.insert(newer)?;

        assert_eq!(registry.packages().len(), 1);
        assert_eq!(registry.packages()[0].installed_files().len(), 1);
        Ok(())
    }

    #[test]
    fn test_remove_missing_is_error() -> Result<()> {
        let dir = tempdir()?;
        let runtime = RealRuntime;
        let mut registry = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        registry.insert(pkg("abc"))?;
        registry.insert(pkg("z"))?;

        assert_eq!(registry.remove("abc")?.name(), "abc");
        assert_eq!(names(&registry), vec!["z"]);

        let err = registry.remove("abc").unwrap_err();
        assert_eq!(
            error::kind(&err),
            Some(&BpmError::PackageNotFound("abc".into()))
        );
        Ok(())
    }

    #[test]
    fn test_load_surfaces_corrupt_file() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("not json".into()));

        assert!(Registry::load(&runtime, Path::new("/etc/bpm/bpm.json")).is_err());
    }

    #[test]
    fn test_load_surfaces_read_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        assert!(Registry::load(&runtime, Path::new("/etc/bpm/bpm.json")).is_err());
    }

    #[test]
    fn test_alias_renames_launcher_triad() -> Result<()> {
        let dir = tempdir()?;
        let bin = dir.path().join("bin");
        fs::create_dir(&bin)?;
        let mut manifest = Manifest::new();
        for file in ["eza.lnk", "eza.cmd", "eza", "eza.exe"] {
            fs::write(bin.join(file), file)?;
            manifest.record(bin.join(file));
        }

        let runtime = RealRuntime;
        let mut registry = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        let mut eza = pkg("eza");
        eza.set_installed_files(manifest);
        registry.insert(eza)?;

        assert_eq!(registry.alias(&bin, "eza", "ls")?, 3);

        assert!(bin.join("ls.lnk").exists());
        assert!(bin.join("ls.cmd").exists());
        assert!(bin.join("ls").exists());
        assert!(bin.join("eza.exe").exists());
        assert!(!bin.join("eza.cmd").exists());

        let reloaded = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        let files: Vec<_> = reloaded.packages()[0]
            .installed_files()
            .iter()
            .map(Path::to_path_buf)
            .collect();
        assert_eq!(
            files,
            vec![
                bin.join("ls.lnk"),
                bin.join("ls.cmd"),
                bin.join("ls"),
                bin.join("eza.exe")
            ]
        );
        Ok(())
    }

    #[test]
    fn test_alias_ignores_files_outside_launcher_dir() -> Result<()> {
        let dir = tempdir()?;
        let bin = dir.path().join("bin");
        let usr_bin = dir.path().join("usr/bin");
        fs::create_dir_all(&bin)?;
        fs::create_dir_all(&usr_bin)?;
        fs::write(usr_bin.join("foo"), "elf")?;
        fs::write(bin.join("foo.cmd"), "@echo off")?;

        let runtime = RealRuntime;
        let mut registry = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        let mut p = pkg("foo");
        p.installed_files_mut().record(usr_bin.join("foo"));
        p.installed_files_mut().record(bin.join("foo.cmd"));
        registry.insert(p)?;

        assert_eq!(registry.alias(&bin, "foo", "bar")?, 1);
        assert!(usr_bin.join("foo").exists());
        assert!(!usr_bin.join("bar").exists());
        assert!(bin.join("bar.cmd").exists());

        let err = registry.alias(&bin, "foo", "baz").unwrap_err();
        assert!(matches!(error::kind(&err), Some(BpmError::LnkNotFound(_))));
        assert!(usr_bin.join("foo").exists());
        Ok(())
    }

    #[test]
    fn test_alias_partial_is_not_an_error() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("old.lnk"), "")?;
        let runtime = RealRuntime;
        let mut registry = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        let mut p = pkg("old");
        p.installed_files_mut().record(dir.path().join("old.lnk"));
        registry.insert(p)?;

        assert_eq!(registry.alias(dir.path(), "old", "new")?, 1);
        assert!(dir.path().join("new.lnk").exists());
        Ok(())
    }

    #[test]
    fn test_alias_missing_launcher_is_lnk_not_found() -> Result<()> {
        let dir = tempdir()?;
        let runtime = RealRuntime;
        let mut registry = Registry::load(&runtime, &dir.path().join("bpm.json"))?;
        let mut p = pkg("gone");
        p.installed_files_mut().record(dir.path().join("gone.lnk"));
        registry.insert(p)?;

        let err = registry.alias(dir.path(), "gone", "here").unwrap_err();
        assert!(matches!(error::kind(&err), Some(BpmError::LnkNotFound(_))));

        let err = registry.alias(dir.path(), "nothing", "here").unwrap_err();
        assert_eq!(
            error::kind(&err),
            Some(&BpmError::LnkNotFound("nothing".into()))
        );
        Ok(())
    }
}
