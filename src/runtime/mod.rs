//! Runtime abstraction for system operations.
//!
//! Every filesystem and terminal side effect of the installer and registry goes
//! through [`Runtime`], so the logic can be tested against a mock or against a
//! temporary directory.
//!
//! # Structure
//!
//! - `path` - Lexical path helpers (normalize, is_path_under)
//! - `env` - Environment variables, well-known directories, privilege
//! - `fs` - File system operations
//! - `user` - Line-based prompts
//! - `user_path` - Per-user PATH registration on Windows

mod env;
mod fs;
pub mod path;
mod user;
mod user_path;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

pub use path::{is_path_under, normalize_path};
pub(crate) use user::prompt_with_io;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    fn create_dir(&self, path: &Path) -> Result<()>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;

    /// Entries of a directory, sorted by path so callers see a stable order.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>>;
    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;

    /// Set file permissions (mode) on Unix systems. No-op on Windows.
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;

    /// Create a desktop shortcut (`.lnk`) at `link` pointing to `target`.
    fn create_shortcut(&self, target: &Path, link: &Path) -> Result<()>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;

    // Privilege
    fn is_privileged(&self) -> bool;

    /// Put `dir` on the user's persistent PATH. Returns whether it was added.
    fn ensure_user_path(&self, dir: &Path) -> Result<bool>;

    // User interaction
    /// Print `prompt` and read one line. Returns `None` when input is closed.
    fn prompt(&self, prompt: &str) -> Result<Option<String>>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.read_impl(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to)
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        self.create_dir_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        self.remove_dir_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.is_file_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        self.create_file_impl(path)
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        self.symlink_impl(original, link)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        self.set_permissions_impl(path, mode)
    }

    fn create_shortcut(&self, target: &Path, link: &Path) -> Result<()> {
        self.create_shortcut_impl(target, link)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn is_privileged(&self) -> bool {
        self.is_privileged_impl()
    }

    fn ensure_user_path(&self, dir: &Path) -> Result<bool> {
        self.ensure_user_path_impl(dir)
    }

    fn prompt(&self, prompt: &str) -> Result<Option<String>> {
        self.prompt_impl(prompt)
    }
}
