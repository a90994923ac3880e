//! Narrow a release's asset list down to the one download for this host.
//!
//! Stages run in a fixed order. Platform and architecture are hard filters;
//! the user filter is skipped when it would leave nothing, and the libc and
//! archive stages only reorder.

use anyhow::Result;
use log::{debug, warn};

use crate::error::BpmError;
use crate::platform::Platform;
use crate::source::AssetDescriptor;

use super::AssetChooser;

/// Suffixes of archives the extractor understands.
const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar", ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tbz2", ".zip", ".7z",
];

/// Suffixes of files published next to the real artifacts.
const AUXILIARY_SUFFIXES: &[&str] = &[
    ".sha256", ".sha256sum", ".sha512", ".md5", ".sig", ".asc", ".pem", ".sbom", ".txt",
    ".json", ".debug", ".dwarf", ".pdb",
];

/// Inputs of one resolution besides the asset list.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub platform: Platform,
    pub prefer_gnu: bool,
    pub interactive: bool,
    pub filters: Vec<String>,
}

impl ResolveContext {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            prefer_gnu: false,
            interactive: false,
            filters: Vec::new(),
        }
    }

    pub fn prefer_gnu(mut self, prefer_gnu: bool) -> Self {
        self.prefer_gnu = prefer_gnu;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn filters(mut self, filters: Vec<String>) -> Self {
        self.filters = filters;
        self
    }
}

/// Pick exactly one asset.
///
/// With `interactive` set the list after the user filter goes to `chooser`
/// and its pick is returned as-is.
pub fn resolve(
    assets: &[AssetDescriptor],
    ctx: &ResolveContext,
    chooser: &dyn AssetChooser,
) -> Result<AssetDescriptor> {
    if assets.is_empty() {
        return Err(BpmError::AssetNotFound(ctx.platform.to_string()).into());
    }

    let candidates = filter_by_user(assets.iter().collect(), &ctx.filters);

    if ctx.interactive {
        let owned: Vec<AssetDescriptor> = candidates.into_iter().cloned().collect();
        let index = chooser.choose(&owned)?;
        return owned.get(index).cloned().ok_or_else(|| {
            BpmError::InvalidOptions(format!("asset choice {} is out of range", index + 1)).into()
        });
    }

    let candidates = filter_required(candidates, &ctx.platform.os_aliases(), ctx)?;
    let mut candidates = filter_required(candidates, &ctx.platform.arch_aliases(), ctx)?;

    sort_by_libc(&mut candidates, ctx.prefer_gnu);
    sort_by_archive(&mut candidates, ctx.platform.is_windows());

    debug!(
        "Asset candidates in order: {:?}",
        candidates.iter().map(|a| &a.name).collect::<Vec<_>>()
    );

    candidates
        .first()
        .map(|a| (*a).clone())
        .ok_or_else(|| invalid_asset(assets.iter().collect(), ctx).into())
}

fn contains_any(name: &str, tokens: &[impl AsRef<str>]) -> bool {
    let name = name.to_lowercase();
    tokens
        .iter()
        .any(|t| name.contains(&t.as_ref().to_lowercase()))
}

/// Keep assets matching any user filter; an empty result keeps the input.
fn filter_by_user<'a>(
    candidates: Vec<&'a AssetDescriptor>,
    filters: &[String],
) -> Vec<&'a AssetDescriptor> {
    if filters.is_empty() {
        return candidates;
    }
    let kept: Vec<_> = candidates
        .iter()
        .copied()
        .filter(|a| contains_any(&a.name, filters))
        .collect();
    if kept.is_empty() {
        warn!("No asset matches filters {:?}, ignoring them", filters);
        candidates
    } else {
        kept
    }
}

/// Keep assets naming one of `aliases`; nothing left is an error.
fn filter_required<'a>(
    candidates: Vec<&'a AssetDescriptor>,
    aliases: &[&str],
    ctx: &ResolveContext,
) -> Result<Vec<&'a AssetDescriptor>> {
    let kept: Vec<_> = candidates
        .iter()
        .copied()
        .filter(|a| contains_any(&a.name, aliases))
        .collect();
    if kept.is_empty() {
        return Err(invalid_asset(candidates, ctx).into());
    }
    Ok(kept)
}

fn invalid_asset(candidates: Vec<&AssetDescriptor>, ctx: &ResolveContext) -> BpmError {
    BpmError::InvalidAsset {
        platform: ctx.platform.to_string(),
        candidates: candidates.into_iter().map(|a| a.name.clone()).collect(),
    }
}

/// musl builds first by default; GNU builds first with `prefer_gnu`.
fn sort_by_libc(candidates: &mut [&AssetDescriptor], prefer_gnu: bool) {
    let preferred = if prefer_gnu { "gnu" } else { "musl" };
    candidates.sort_by_key(|a| !a.name.to_lowercase().contains(preferred));
}

fn archive_rank(name: &str, windows_host: bool) -> u8 {
    let name = name.to_lowercase();
    let recognized = ARCHIVE_SUFFIXES.iter().any(|s| name.ends_with(s))
        || (windows_host && name.ends_with(".exe"));
    if recognized {
        0
    } else if AUXILIARY_SUFFIXES.iter().any(|s| name.ends_with(s)) || name.contains("checksum") {
        2
    } else {
        1
    }
}

/// Recognized archives first, checksums and signatures last.
fn sort_by_archive(candidates: &mut [&AssetDescriptor], windows_host: bool) {
    candidates.sort_by_key(|a| archive_rank(&a.name, windows_host));
}
