use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::Manifest;
use crate::error::BpmError;
use crate::source::{AssetDescriptor, RepoId};

/// Resolution and install switches stored with a package so updates reuse them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFlags {
    #[serde(default)]
    pub prefer_gnu: bool,
    #[serde(default)]
    pub one_bin: bool,
    #[serde(default)]
    pub asset_filters: Vec<String>,
}

/// One installed (or about to be installed) package.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Package {
    name: String,
    #[serde(default)]
    bin_name: Option<String>,
    #[serde(default)]
    source: Option<RepoId>,
    #[serde(default)]
    asset: Option<AssetDescriptor>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    installed_files: Manifest,
    #[serde(default)]
    flags: PackageFlags,
}

impl Package {
    pub fn builder(name: impl Into<String>) -> PackageBuilder {
        PackageBuilder {
            name: name.into(),
            bin_name: None,
            source: None,
            flags: PackageFlags::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The explicitly configured binary name, if any.
    pub fn bin_name(&self) -> Option<&str> {
        self.bin_name.as_deref()
    }

    /// Name of the main executable: the configured one or the package name.
    pub fn binary_name(&self) -> &str {
        self.bin_name.as_deref().unwrap_or(&self.name)
    }

    pub fn source(&self) -> Option<&RepoId> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: RepoId) {
        self.source = Some(source);
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The resolved asset. Always `None` while the upstream repository is unknown.
    pub fn asset(&self) -> Option<&AssetDescriptor> {
        self.source.as_ref().and(self.asset.as_ref())
    }

    pub fn asset_url(&self) -> Option<&str> {
        self.asset().map(|a| a.url.as_str())
    }

    /// Record the release version and the asset chosen from it.
    pub fn set_release(&mut self, version: impl Into<String>, asset: AssetDescriptor) -> Result<()> {
        if self.source.is_none() {
            return Err(BpmError::InvalidOptions(format!(
                "package `{}` has no source repository yet",
                self.name
            ))
            .into());
        }
        self.version = Some(version.into());
        self.asset = Some(asset);
        Ok(())
    }

    pub fn installed_files(&self) -> &Manifest {
        &self.installed_files
    }

    pub fn installed_files_mut(&mut self) -> &mut Manifest {
        &mut self.installed_files
    }

    pub fn set_installed_files(&mut self, manifest: Manifest) {
        self.installed_files = manifest;
    }

    pub fn flags(&self) -> &PackageFlags {
        &self.flags
    }
}

pub struct PackageBuilder {
    name: String,
    bin_name: Option<String>,
    source: Option<RepoId>,
    flags: PackageFlags,
}

impl PackageBuilder {
    pub fn bin_name(mut self, bin_name: Option<String>) -> Self {
        self.bin_name = bin_name.filter(|b| !b.is_empty());
        self
    }

    pub fn source(mut self, source: Option<RepoId>) -> Self {
        self.source = source;
        self
    }

    pub fn flags(mut self, flags: PackageFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> Result<Package> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(BpmError::InvalidOptions("package name is empty".into()).into());
        }
        if name.contains(['/', '\\']) {
            return Err(BpmError::InvalidOptions(format!(
                "package name `{}` must not contain path separators",
                name
            ))
            .into());
        }
        Ok(Package {
            name,
            bin_name: self.bin_name,
            source: self.source,
            asset: None,
            version: None,
            installed_files: Manifest::new(),
            flags: self.flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;

    #[test]
    fn test_builder_defaults() {
        let pkg = Package::builder("eza").build().unwrap();
        assert_eq!(pkg.name(), "eza");
        assert_eq!(pkg.binary_name(), "eza");
        assert!(pkg.bin_name().is_none());
        assert!(pkg.source().is_none());
        assert!(pkg.version().is_none());
        assert!(pkg.installed_files().is_empty());
    }

    #[test]
    fn test_builder_rejects_bad_names() {
        for name in ["", "   ", "a/b"] {
            let err = Package::builder(name).build().unwrap_err();
            assert!(matches!(
                error::kind(&err),
                Some(BpmError::InvalidOptions(_))
            ));
        }
    }

    #[test]
    fn test_explicit_bin_name() {
        let pkg = Package::builder("ripgrep")
            .bin_name(Some("rg".into()))
            .build()
            .unwrap();
        assert_eq!(pkg.binary_name(), "rg");
    }

    #[test]
    fn test_asset_requires_source() {
        let mut pkg = Package::builder("app").build().unwrap();
        let asset = AssetDescriptor::new("app.tar.gz", "https://dl/app.tar.gz");
        assert!(pkg.set_release("v1", asset.clone()).is_err());
        assert!(pkg.asset_url().is_none());

        pkg.set_source(RepoId::new("o", "app"));
        pkg.set_release("v1", asset).unwrap();
        assert_eq!(pkg.asset_url(), Some("https://dl/app.tar.gz"));
        assert_eq!(pkg.version(), Some("v1"));
    }

    #[test]
    fn test_serde_keeps_manifest_order() {
        let mut pkg = Package::builder("app")
            .source(Some(RepoId::new("o", "app")))
            .build()
            .unwrap();
        pkg.installed_files_mut().record("/usr/bin/app");
        pkg.installed_files_mut().record("/usr/share/man/man1/app.1");

        let json = serde_json::to_string(&pkg).unwrap();
        let back: Package = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pkg);
    }
}
