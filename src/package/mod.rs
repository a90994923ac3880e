//! Package management module
//!
//! A [`Package`] is what the registry tracks; its [`Manifest`] records every
//! path an install touched and drives rollback and removal.

mod manifest;
mod meta;
mod registry;

pub use manifest::Manifest;
pub use meta::{Package, PackageBuilder, PackageFlags};
pub use registry::{REGISTRY_FILE, Registry};
