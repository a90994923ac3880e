//! Path utility functions for normalization, containment and shell translation.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` that cannot be popped is kept so escapes stay visible.
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if `path` is under `dir` by comparing normalized path components.
///
/// `/prefix/bin/../../etc/passwd` is NOT under `/prefix`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Split `C:\Users\me` into (`c`, `Users/me`).
fn split_drive(windows_path: &str) -> Option<(String, String)> {
    let (drive, rest) = windows_path.split_once(':')?;
    if drive.len() != 1 || !drive.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let rest = rest.replace('\\', "/");
    Some((
        drive.to_ascii_lowercase(),
        rest.trim_start_matches('/').to_string(),
    ))
}

/// Translate a Windows path for a native Windows POSIX shell (Git Bash, MSYS):
/// `C:\Users\me\bpm` -> `/c/Users/me/bpm`.
pub fn windows_to_posix_shell(windows_path: &str) -> String {
    match split_drive(windows_path) {
        Some((drive, rest)) => format!("/{}/{}", drive, rest),
        None => windows_path.replace('\\', "/"),
    }
}

/// Translate a Windows path for a Linux-compatible subsystem (WSL):
/// `C:\Users\me\bpm` -> `/mnt/c/Users/me/bpm`.
pub fn windows_to_wsl(windows_path: &str) -> String {
    match split_drive(windows_path) {
        Some((drive, rest)) => format!("/mnt/{}/{}", drive, rest),
        None => windows_path.replace('\\', "/"),
    }
}
