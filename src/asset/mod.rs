//! Asset selection module
//!
//! Picks which file of a release to download for the current platform,
//! either automatically or through an [`AssetChooser`].

mod chooser;
mod resolver;

#[cfg(test)]
pub use chooser::MockAssetChooser;
pub use chooser::{AssetChooser, PromptChooser};
pub use resolver::{ResolveContext, resolve};
