use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use log::{debug, info};
use std::io::{Cursor, Read};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use xz2::read::XzDecoder;

use super::ArchiveExtractor;
use crate::error::BpmError;
use crate::runtime::{Runtime, is_path_under, normalize_path};

const TAR_SUFFIXES: &[&str] = &[
    ".tar", ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tbz2", ".tbz",
];

/// Extractor for tar archives, plain or gzip/xz/bzip2 compressed.
///
/// Every member is checked against the destination before anything is
/// written; one escaping member rejects the whole archive.
pub struct TarExtractor;

impl ArchiveExtractor for TarExtractor {
    fn can_handle(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        TAR_SUFFIXES.iter().any(|s| name.ends_with(s))
    }

    fn extract<R: Runtime>(&self, runtime: &R, bytes: &[u8], extract_to: &Path) -> Result<()> {
        let data = decompress(bytes)?;

        check_members(&data, extract_to)?;

        let mut archive = Archive::new(Cursor::new(&data));
        for entry in archive.entries().context("Failed to read tar archive")? {
            let mut entry = entry.context("Failed to read tar entry")?;
            let member = entry.path()?.into_owned();
            let full_path = extract_to.join(&member);

            match entry.header().entry_type() {
                EntryType::Directory => runtime.create_dir_all(&full_path)?,
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest);
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                EntryType::Symlink => {
                    let Some(target) = entry.link_name()? else {
                        continue;
                    };
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    runtime.symlink(&target, &full_path)?;
                }
                EntryType::Link => {
                    let Some(target) = entry.link_name()? else {
                        continue;
                    };
                    runtime.copy(&extract_to.join(target), &full_path)?;
                }
                other => debug!("Skipping tar entry {:?} of type {:?}", member, other),
            }
        }

        info!("Extraction complete.");
        Ok(())
    }
}

/// Undo the outer compression layer, recognized by its magic bytes.
fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut reader: Box<dyn Read + '_> = if bytes.starts_with(&[0x1f, 0x8b]) {
        Box::new(GzDecoder::new(bytes))
    } else if bytes.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        Box::new(XzDecoder::new(bytes))
    } else if bytes.starts_with(b"BZh") {
        Box::new(BzDecoder::new(bytes))
    } else {
        return Ok(bytes.to_vec());
    };
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .context("Failed to decompress archive")?;
    Ok(data)
}

/// Reject the archive if any member, or any link target, resolves outside `root`.
///
/// Lexical checks alone are not enough once symlinks are written: a member
/// may not live below a symlink of the same archive, may not replace one, and
/// a link target may not pass through one.
fn check_members(data: &[u8], root: &Path) -> Result<()> {
    let root = &normalize_path(root);
    let symlinks = symlink_members(data, root)?;

    let mut archive = Archive::new(Cursor::new(data));
    for entry in archive.entries().context("Failed to read tar archive")? {
        let entry = entry.context("Failed to read tar entry")?;
        let member: PathBuf = entry.path()?.into_owned();
        let full_path = normalize_path(&root.join(&member));
        if !is_path_under(&full_path, root) {
            return Err(BpmError::TarPathTraversal { member }.into());
        }
        if full_path
            .ancestors()
            .skip(1)
            .any(|ancestor| symlinks.contains(ancestor))
        {
            debug!("{:?} lies below a symlink of the archive", member);
            return Err(BpmError::TarPathTraversal { member }.into());
        }

        let inside = match entry.header().entry_type() {
            EntryType::Symlink => match entry.link_name()? {
                Some(target) => {
                    let base = full_path.parent().unwrap_or(root);
                    resolves_inside(base, &target, root, &symlinks)
                }
                None => true,
            },
            EntryType::Link => match entry.link_name()? {
                Some(target) => resolves_inside(root, &target, root, &symlinks),
                None => true,
            },
            _ => !symlinks.contains(&full_path),
        };
        if !inside {
            return Err(BpmError::TarPathTraversal { member }.into());
        }
    }
    Ok(())
}

/// Normalized destinations of every symlink member. A path claimed by two
/// symlinks is rejected.
fn symlink_members(data: &[u8], root: &Path) -> Result<HashSet<PathBuf>> {
    let mut symlinks = HashSet::new();
    let mut archive = Archive::new(Cursor::new(data));
    for entry in archive.entries().context("Failed to read tar archive")? {
        let entry = entry.context("Failed to read tar entry")?;
        if entry.header().entry_type() != EntryType::Symlink {
            continue;
        }
        let member: PathBuf = entry.path()?.into_owned();
        if !symlinks.insert(normalize_path(&root.join(&member))) {
            return Err(BpmError::TarPathTraversal { member }.into());
        }
    }
    Ok(symlinks)
}

/// Walk `target` from `base` one component at a time. Stepping out of a
/// symlink of the archive, or above `root`, fails.
fn resolves_inside(base: &Path, target: &Path, root: &Path, symlinks: &HashSet<PathBuf>) -> bool {
    let mut current = normalize_path(base);
    for component in target.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir | Component::Normal(_) if symlinks.contains(&current) => {
                return false;
            }
            Component::ParentDir => {
                if current == root || !current.pop() {
                    return false;
                }
            }
            Component::Normal(name) => current.push(name),
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    is_path_under(&current, root)
}
