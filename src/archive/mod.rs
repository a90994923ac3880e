//! Archive extraction.
//!
//! The declared file name picks the format: `.zip`, `.7z`, raw executables on
//! Windows, and the tar family for everything else. Extraction reports the
//! effective root: the single top-level directory when the archive has one,
//! otherwise the extraction directory itself.

mod sevenz;
mod tar;
mod zip;

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub use self::sevenz::SevenZExtractor;
pub use self::tar::TarExtractor;
pub use self::zip::ZipExtractor;

/// Trait for format-specific archive extractors
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle an archive with the given file name
    fn can_handle(&self, name: &str) -> bool;

    /// Extract the archive bytes into `extract_to`, which must exist
    fn extract<R: Runtime>(&self, runtime: &R, bytes: &[u8], extract_to: &Path) -> Result<()>;
}

/// Dispatcher that selects the appropriate extractor based on archive name.
pub struct Extractor {
    tar: TarExtractor,
    zip: ZipExtractor,
    sevenz: SevenZExtractor,
    windows_host: bool,
}

impl Extractor {
    pub fn new(windows_host: bool) -> Self {
        Self {
            tar: TarExtractor,
            zip: ZipExtractor,
            sevenz: SevenZExtractor,
            windows_host,
        }
    }

    /// Windows executables and installers are used as downloaded.
    fn is_raw(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.windows_host && (name.ends_with(".exe") || name.ends_with(".msi"))
    }

    /// Unpack `bytes` named `name` into `work_dir` and return the effective root.
    #[tracing::instrument(skip(self, runtime, bytes))]
    pub fn extract<R: Runtime>(
        &self,
        runtime: &R,
        bytes: &[u8],
        name: &str,
        work_dir: &Path,
    ) -> Result<PathBuf> {
        debug!("Extracting `{}` to {:?}...", name, work_dir);
        runtime.create_dir_all(work_dir)?;

        if self.is_raw(name) {
            let target = work_dir.join(name);
            runtime
                .write(&target, bytes)
                .with_context(|| format!("Failed to write {:?}", target))?;
            return Ok(work_dir.to_path_buf());
        }

        if self.zip.can_handle(name) {
            self.zip.extract(runtime, bytes, work_dir)?;
        } else if self.sevenz.can_handle(name) {
            self.sevenz.extract(runtime, bytes, work_dir)?;
        } else {
            if !self.tar.can_handle(name) {
                warn!("Unknown file type `{}`, trying tar", name);
            }
            self.tar.extract(runtime, bytes, work_dir)?;
        }

        effective_root(runtime, work_dir)
    }
}

/// The lone top-level directory of `dir`, or `dir` itself.
fn effective_root<R: Runtime>(runtime: &R, dir: &Path) -> Result<PathBuf> {
    let entries = runtime
        .read_dir(dir)
        .with_context(|| format!("Failed to read extraction directory {:?}", dir))?;
    match entries.as_slice() {
        [] => anyhow::bail!("Archive appears to be empty."),
        [only] if runtime.is_dir(only) => Ok(only.clone()),
        _ => Ok(dir.to_path_buf()),
    }
}
