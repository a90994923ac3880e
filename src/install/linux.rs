//! Merging an extracted tree into the Linux system hierarchy.

use anyhow::{Context, Result};
use glob::Pattern;
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::layout::LinuxLayout;
use super::placer::Placer;
use crate::error::BpmError;
use crate::package::Package;
use crate::runtime::Runtime;

/// Entries starting with this are completion directories.
const COMPLETIONS_PREFIX: &str = "complet";

struct LinuxInstall<'p, 'a, R: Runtime> {
    layout: &'p LinuxLayout,
    placer: &'p mut Placer<'a, R>,
    pattern: Pattern,
    /// Source files already placed as the main binary.
    placed: HashSet<PathBuf>,
}

impl LinuxLayout {
    /// Install the tree at `root`.
    ///
    /// The main binary goes to `usr/bin`; `bin`, `lib`, `include`, `share`,
    /// `man` and `usr` merge into their system counterparts; completions and
    /// systemd units go where their shells and init system look for them.
    pub fn install<R: Runtime>(
        &self,
        placer: &mut Placer<'_, R>,
        root: &Path,
        pkg: &Package,
        binary_pattern: &str,
    ) -> Result<()> {
        let pattern = Pattern::new(binary_pattern)
            .with_context(|| format!("Invalid binary name `{}`", binary_pattern))?;
        let mut job = LinuxInstall {
            layout: self,
            placer,
            pattern,
            placed: HashSet::new(),
        };
        job.run(root, pkg.flags().one_bin)
    }
}

impl<R: Runtime> LinuxInstall<'_, '_, R> {
    fn runtime(&self) -> &R {
        self.placer.runtime()
    }

    fn run(&mut self, root: &Path, one_bin: bool) -> Result<()> {
        let first_layer = self.runtime().read_dir(root)?;
        if first_layer.is_empty() {
            return Err(BpmError::InstallFailure(format!("{:?} is empty", root)).into());
        }

        if one_bin || first_layer.len() == 1 {
            // A lone file is the binary whatever its name.
            let bin = match first_layer.as_slice() {
                [only] if self.runtime().is_file(only) => Some(only.clone()),
                _ => self.find_binary(root)?,
            };
            match bin {
                Some(bin) => {
                    debug!("judge out bin: selected {:?}", bin);
                    self.install_bin(&bin)?;
                    if one_bin {
                        return Ok(());
                    }
                }
                None if one_bin => {
                    return Err(BpmError::InstallFailure(format!(
                        "no binary matching `{}` in {:?}",
                        self.pattern, root
                    ))
                    .into());
                }
                None => {}
            }
        }

        for entry in &first_layer {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(target) = self.layout.merge_target(name) {
                if self.runtime().is_dir(entry) {
                    self.placer.merge_dir(entry, &target, &self.placed)?;
                    continue;
                }
            }
            if name.starts_with(COMPLETIONS_PREFIX) {
                self.install_completions(entry)?;
            } else if self.pattern.matches(name) && self.runtime().is_file(entry) {
                self.install_bin(entry)?;
            } else {
                debug!("cannot match {}.", name);
            }
        }

        for service in self.walk(root)? {
            if service.extension().is_some_and(|e| e == "service") {
                let target = self.layout.service_dir();
                self.install_optional(&service, &target)?;
            }
        }

        let bin_dir = self.layout.bin_dir();
        if !self.placer.manifest().iter().any(|p| p.starts_with(&bin_dir)) {
            warn!("No binary file found, please check the release package.");
        }
        Ok(())
    }

    /// Regular files under `dir`, depth first in path order.
    fn walk(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in self.runtime().read_dir(dir)? {
            if self.runtime().is_dir(&entry) {
                files.extend(self.walk(&entry)?);
            } else if self.runtime().is_file(&entry) {
                files.push(entry);
            }
        }
        Ok(files)
    }

    fn find_binary(&self, root: &Path) -> Result<Option<PathBuf>> {
        Ok(self.walk(root)?.into_iter().find(|f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| self.pattern.matches(n))
        }))
    }

    /// Only the first match becomes the main binary.
    fn install_bin(&mut self, bin: &Path) -> Result<()> {
        if !self.placed.is_empty() {
            debug!("already installed a binary, skipping {:?}", bin);
            return Ok(());
        }
        let Some(name) = bin.file_name() else {
            return Ok(());
        };
        let to = self.layout.bin_dir().join(name);
        self.placer.place_file(bin, &to, Some(0o755))?;
        self.placed.insert(bin.to_path_buf());
        Ok(())
    }

    /// Place `file` into `dir` only if that directory already exists on this host.
    fn install_optional(&mut self, file: &Path, dir: &Path) -> Result<()> {
        if self.placed.contains(file) {
            return Ok(());
        }
        if !self.runtime().is_dir(dir) {
            debug!("{:?} does not exist, skipping {:?}", dir, file);
            return Ok(());
        }
        let Some(name) = file.file_name() else {
            return Ok(());
        };
        self.placer.place_file(file, &dir.join(name), Some(0o644))
    }

    fn install_completions(&mut self, dir: &Path) -> Result<()> {
        debug!("installing completions from {:?}", dir);
        if !self.runtime().is_dir(dir) {
            warn!("trying to install {:?} as completions: not a directory", dir);
            return Ok(());
        }
        for file in self.walk(dir)? {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let target = if name.ends_with(".fish") {
                Some(self.layout.fish_completions_dir())
            } else if name.ends_with(".bash") {
                Some(self.layout.bash_completions_dir())
            } else if name.starts_with('_') && self.is_zsh_completion(&file) {
                Some(self.layout.zsh_completions_dir())
            } else {
                None
            };
            if let Some(target) = target {
                self.install_optional(&file, &target)?;
            }
        }
        Ok(())
    }

    /// zsh completion files carry no extension; they mention zsh in their body.
    fn is_zsh_completion(&self, file: &Path) -> bool {
        self.runtime()
            .read(file)
            .map(|bytes| bytes.windows(3).any(|w| w == b"zsh"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::rollback::rollback;
    use crate::install::{ConflictPolicy, ExecMode, InstallOptions};
    use crate::package::PackageFlags;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::tempdir;

    fn pkg(name: &str, one_bin: bool) -> Package {
        Package::builder(name)
            .flags(PackageFlags {
                one_bin,
                ..Default::default()
            })
            .build()
            .unwrap()
    }

    fn options() -> InstallOptions {
        InstallOptions::new(ConflictPolicy::Rename, ExecMode::Apply)
    }

    /// Host prefix with the directories a stock distribution ships.
    fn host(prefix: &Path) -> LinuxLayout {
        let layout = LinuxLayout::new(prefix);
        fs::create_dir_all(layout.bin_dir()).unwrap();
        fs::create_dir_all(layout.man_dir()).unwrap();
        layout
    }

    fn man_page_tree(src: &Path) -> Result<()> {
        fs::create_dir_all(src.join("bin"))?;
        fs::create_dir_all(src.join("share/man/man1"))?;
        fs::write(src.join("bin/foo"), "#!/bin/sh")?;
        fs::write(src.join("share/man/man1/foo.1"), ".TH FOO")?;
        fs::write(src.join("README.md"), "readme")?;
        Ok(())
    }

    #[test]
    fn test_install_binary_and_man_page() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        man_page_tree(&src)?;
        let prefix = dir.path().join("host");
        let layout = LinuxLayout::new(&prefix);

        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        layout.install(&mut placer, &src, &pkg("foo", false), "foo")?;

        assert_eq!(fs::read_to_string(layout.bin_dir().join("foo"))?, "#!/bin/sh");
        assert!(!layout.usr().join("README.md").exists());
        let manifest: Vec<_> = placer.manifest().iter().map(Path::to_path_buf).collect();
        assert_eq!(
            manifest,
            vec![
                prefix.clone(),
                prefix.join("usr"),
                prefix.join("usr/bin"),
                prefix.join("usr/bin/foo"),
                prefix.join("usr/share"),
                prefix.join("usr/share/man"),
                prefix.join("usr/share/man/man1"),
                prefix.join("usr/share/man/man1/foo.1"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_existing_system_dirs_are_not_recorded() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        man_page_tree(&src)?;
        let layout = host(&dir.path().join("host"));

        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        layout.install(&mut placer, &src, &pkg("foo", false), "foo")?;

        let manifest: Vec<_> = placer.manifest().iter().map(Path::to_path_buf).collect();
        assert_eq!(
            manifest,
            vec![
                layout.bin_dir().join("foo"),
                layout.man_dir().join("man1"),
                layout.man_dir().join("man1/foo.1"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_one_bin_installs_only_the_binary() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("docs"))?;
        fs::write(src.join("docs/rg"), "rg binary")?;
        fs::create_dir_all(src.join("share/doc"))?;
        fs::write(src.join("share/doc/README"), "docs")?;
        let layout = host(&dir.path().join("host"));

        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        let pkg = Package::builder("ripgrep")
            .bin_name(Some("rg".into()))
            .flags(PackageFlags {
                one_bin: true,
                ..Default::default()
            })
            .build()?;
        layout.install(&mut placer, &src, &pkg, "rg")?;

        assert_eq!(fs::read_to_string(layout.bin_dir().join("rg"))?, "rg binary");
        assert!(!layout.share_dir().join("doc").exists());
        assert_eq!(placer.manifest().len(), 1);
        Ok(())
    }

    #[test]
    fn test_one_bin_without_match_fails() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(&src)?;
        fs::write(src.join("other"), "x")?;
        fs::write(src.join("another"), "y")?;
        let layout = host(&dir.path().join("host"));

        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        let err = layout
            .install(&mut placer, &src, &pkg("foo", true), "foo")
            .unwrap_err();
        assert!(matches!(
            crate::error::kind(&err),
            Some(BpmError::InstallFailure(_))
        ));
        Ok(())
    }

    #[test]
    fn test_single_file_is_the_binary() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(&src)?;
        fs::write(src.join("jq-linux-amd64"), "jq")?;
        let layout = host(&dir.path().join("host"));

        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        layout.install(&mut placer, &src, &pkg("jq", false), "jq")?;

        assert!(layout.bin_dir().join("jq-linux-amd64").exists());
        Ok(())
    }

    #[test]
    fn test_empty_tree_fails() -> Result<()> {
        let dir = tempdir()?;
        let layout = host(&dir.path().join("host"));
        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        assert!(
            layout
                .install(&mut placer, dir.path().join("host/usr/share/man").as_path(), &pkg("foo", false), "foo")
                .is_err()
        );
        Ok(())
    }

    #[test]
    fn test_completions_go_to_existing_shell_dirs() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("completion"))?;
        fs::write(src.join("foo"), "bin")?;
        fs::write(src.join("completion/foo.fish"), "complete -c foo")?;
        fs::write(src.join("completion/foo.bash"), "complete -F _foo foo")?;
        fs::write(src.join("completion/_foo"), "#compdef foo zsh")?;
        fs::write(src.join("completion/_notes"), "plain text")?;
        let layout = host(&dir.path().join("host"));
        fs::create_dir_all(layout.fish_completions_dir())?;
        fs::create_dir_all(layout.zsh_completions_dir())?;

        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        layout.install(&mut placer, &src, &pkg("foo", false), "foo")?;

        assert!(layout.fish_completions_dir().join("foo.fish").exists());
        assert!(layout.zsh_completions_dir().join("_foo").exists());
        assert!(!layout.zsh_completions_dir().join("_notes").exists());
        assert!(!layout.bash_completions_dir().exists());
        Ok(())
    }

    #[test]
    fn test_services_need_systemd_dir() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("contrib"))?;
        fs::write(src.join("foo"), "bin")?;
        fs::write(src.join("contrib/foo.service"), "[Unit]")?;

        let without = host(&dir.path().join("a"));
        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        without.install(&mut placer, &src, &pkg("foo", false), "foo")?;
        assert!(!without.service_dir().exists());

        let with = host(&dir.path().join("b"));
        fs::create_dir_all(with.service_dir())?;
        let mut placer = Placer::new(&runtime, &options());
        with.install(&mut placer, &src, &pkg("foo", false), "foo")?;
        assert!(with.service_dir().join("foo.service").exists());
        Ok(())
    }

    #[test]
    fn test_rollback_restores_previous_state() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("bin"))?;
        fs::create_dir_all(src.join("man/man1"))?;
        fs::write(src.join("bin/foo"), "v2")?;
        fs::write(src.join("man/man1/foo.1"), "man")?;
        let layout = host(&dir.path().join("host"));
        fs::write(layout.bin_dir().join("foo"), "v1")?;
        fs::write(layout.bin_dir().join("foo.old"), "v0")?;

        let runtime = RealRuntime;
        let mut placer = Placer::new(&runtime, &options());
        layout.install(&mut placer, &src, &pkg("foo", false), "foo")?;
        assert_eq!(fs::read_to_string(layout.bin_dir().join("foo"))?, "v2");

        rollback(&runtime, placer.manifest())?;

        assert_eq!(fs::read_to_string(layout.bin_dir().join("foo"))?, "v1");
        assert_eq!(fs::read_to_string(layout.bin_dir().join("foo.old"))?, "v0");
        assert!(!layout.bin_dir().join("foo.old.old").exists());
        assert!(!layout.man_dir().join("man1").exists());
        assert!(layout.man_dir().exists());
        Ok(())
    }

    #[test]
    fn test_dry_run_touches_nothing() -> Result<()> {
        let mut runtime = MockRuntime::new();
        let src = PathBuf::from("/tmp/x");
        runtime
            .expect_read_dir()
            .withf(|p| p == Path::new("/tmp/x"))
            .returning(|_| Ok(vec![PathBuf::from("/tmp/x/foo"), PathBuf::from("/tmp/x/LICENSE")]));
        runtime
            .expect_is_file()
            .returning(|p| p.starts_with("/tmp/x"));
        runtime
            .expect_is_dir()
            .returning(|p| p == Path::new("/") || p == Path::new("/usr") || p == Path::new("/usr/bin"));
        runtime.expect_exists().returning(|_| false);
        runtime.expect_copy().never();
        runtime.expect_create_dir().never();
        runtime.expect_set_permissions().never();

        let options = InstallOptions::new(ConflictPolicy::Rename, ExecMode::DryRun);
        let mut placer = Placer::new(&runtime, &options);
        LinuxLayout::new("/").install(&mut placer, &src, &pkg("foo", false), "foo")?;

        let paths: Vec<_> = placer.manifest().iter().collect();
        assert_eq!(paths, vec![Path::new("/usr/bin/foo")]);
        Ok(())
    }
}
