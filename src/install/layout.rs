//! Where installed files go on each kind of host.
//!
//! The layout is chosen once from the platform and handed to the installer,
//! which never branches on the host itself.

use std::path::{Path, PathBuf};

use super::rollback::RemoveStrategy;
use crate::package::Package;
use crate::platform::Platform;

/// Linux: merge into the system hierarchy under a prefix (normally `/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxLayout {
    prefix: PathBuf,
}

impl LinuxLayout {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn usr(&self) -> PathBuf {
        self.prefix.join("usr")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.usr().join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.usr().join("lib")
    }

    pub fn include_dir(&self) -> PathBuf {
        self.usr().join("include")
    }

    pub fn share_dir(&self) -> PathBuf {
        self.usr().join("share")
    }

    pub fn man_dir(&self) -> PathBuf {
        self.share_dir().join("man")
    }

    pub fn fish_completions_dir(&self) -> PathBuf {
        self.share_dir().join("fish/vendor_completions.d")
    }

    pub fn bash_completions_dir(&self) -> PathBuf {
        self.share_dir().join("bash-completion/completions")
    }

    pub fn zsh_completions_dir(&self) -> PathBuf {
        self.share_dir().join("zsh/site-functions")
    }

    pub fn service_dir(&self) -> PathBuf {
        self.lib_dir().join("systemd/system")
    }

    /// Target of a well-known top-level directory of an extracted tree.
    pub fn merge_target(&self, name: &str) -> Option<PathBuf> {
        match name {
            "usr" => Some(self.usr()),
            "bin" => Some(self.bin_dir()),
            "lib" => Some(self.lib_dir()),
            "include" => Some(self.include_dir()),
            "share" => Some(self.share_dir()),
            "man" => Some(self.man_dir()),
            _ => None,
        }
    }
}

/// Windows: one directory per package plus a shared launcher directory, all
/// inside the managed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsLayout {
    root: PathBuf,
}

impl WindowsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root.join("app")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.app_dir().join(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Linux(LinuxLayout),
    Windows(WindowsLayout),
}

impl Layout {
    /// Windows hosts get the managed-root layout, every other host the system prefix.
    pub fn for_platform(platform: &Platform, root: &Path, prefix: &Path) -> Self {
        if platform.is_windows() {
            Layout::Windows(WindowsLayout::new(root))
        } else {
            Layout::Linux(LinuxLayout::new(prefix))
        }
    }

    /// Glob pattern naming the package's executables.
    pub fn binary_pattern(&self, pkg: &Package) -> String {
        match self {
            Layout::Linux(_) => pkg.binary_name().to_string(),
            Layout::Windows(_) => match pkg.bin_name() {
                Some(name) if name.to_lowercase().ends_with(".exe") => name.to_string(),
                Some(name) => format!("{}.exe", name),
                None => "*.exe".to_string(),
            },
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        match self {
            Layout::Linux(l) => l.bin_dir(),
            Layout::Windows(w) => w.bin_dir(),
        }
    }

    pub fn remove_strategy(&self) -> RemoveStrategy {
        match self {
            Layout::Linux(_) => RemoveStrategy::Restore,
            Layout::Windows(w) => RemoveStrategy::Purge {
                root: w.root().to_path_buf(),
            },
        }
    }

    /// Installing into the real system hierarchy needs elevated privileges.
    pub fn needs_privilege(&self) -> bool {
        match self {
            Layout::Linux(l) => l.prefix() == Path::new("/"),
            Layout::Windows(_) => false,
        }
    }
}
