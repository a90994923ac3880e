//! Domain errors.
//!
//! Everything is propagated as `anyhow::Error`; the variants below are the
//! failures callers need to tell apart, recovered with `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BpmError {
    /// No such upstream project, or it has no releases at all.
    #[error("Repository{} not found", quoted(.0))]
    RepoNotFound(String),

    /// Releases exist but none of them carry downloadable assets.
    #[error("No available asset found in {0}")]
    AssetNotFound(String),

    /// Assets exist but none survived platform/architecture filtering.
    #[error("No asset matches this platform ({platform}); candidates were: {candidates:?}")]
    InvalidAsset {
        platform: String,
        candidates: Vec<String>,
    },

    #[error("Archive member {member:?} escapes the archive root")]
    TarPathTraversal { member: PathBuf },

    /// Launcher artifact to alias is missing.
    #[error("Launcher{} not found", quoted(.0))]
    LnkNotFound(String),

    #[error("Installation failed: {0}")]
    InstallFailure(String),

    #[error("Package `{0}` is not installed")]
    PackageNotFound(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Refusing to remove {path:?}: outside of managed root {root:?}")]
    UnsafeRemoval { path: PathBuf, root: PathBuf },
}

fn quoted(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!(" '{}'", name)
    }
}

/// Returns the domain error carried by `err`, if any.
pub fn kind(err: &anyhow::Error) -> Option<&BpmError> {
    err.downcast_ref::<BpmError>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<BpmError>()))
}
