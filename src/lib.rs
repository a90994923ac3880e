pub mod archive;
pub mod asset;
pub mod commands;
pub mod error;
pub mod install;
pub mod package;
pub mod platform;
pub mod runtime;
pub mod source;
