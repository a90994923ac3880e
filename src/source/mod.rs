//! Release metadata sources.
//!
//! A [`ReleaseSource`] turns an `owner/repo` identity into the list of
//! releases and their downloadable assets, finds repositories by name, and
//! fetches asset bytes. The installer core never talks to the network itself.

mod github;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BpmError;

pub use github::GitHubSource;

/// Repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse `https://github.com/<owner>/<repo>`.
    ///
    /// Returns `None` for anything that is not a repository URL on github.com.
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let (host, path) = rest.split_once('/')?;
        if !host.eq_ignore_ascii_case("github.com") && !host.eq_ignore_ascii_case("www.github.com")
        {
            return None;
        }
        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        path.parse().ok()
    }

    /// Web page of the repository.
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim_matches('/').split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            anyhow::bail!("Invalid repository format. Expected 'owner/repo'.")
        } else {
            Ok(RepoId::new(parts[0], parts[1]))
        }
    }
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub name: String,
    pub url: String,
}

impl AssetDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Build a descriptor from a bare download URL; the name is its last path segment.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self { name, url }
    }
}

/// A release from the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Version tag (e.g., "v1.0.0")
    pub tag: String,
    pub assets: Vec<AssetDescriptor>,
}

/// Sort order for repository search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchSort {
    Stars,
    Forks,
    HelpWantedIssues,
    Updated,
}

impl SearchSort {
    pub fn as_query(&self) -> &'static str {
        match self {
            SearchSort::Stars => "stars",
            SearchSort::Forks => "forks",
            SearchSort::HelpWantedIssues => "help-wanted-issues",
            SearchSort::Updated => "updated",
        }
    }
}

/// Trait for release metadata sources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// All releases of a repository, newest first.
    async fn releases(&self, repo: &RepoId) -> Result<Vec<Release>>;

    /// One page of repositories whose name matches `query`, best match first.
    async fn search(
        &self,
        query: &str,
        page: u32,
        sort: Option<SearchSort>,
    ) -> Result<Vec<RepoId>>;

    /// Fetch the bytes behind an asset URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Pick the newest release that carries assets.
///
/// No releases at all is [`BpmError::RepoNotFound`]; releases without any
/// assets are [`BpmError::AssetNotFound`].
pub fn latest_with_assets<'a>(repo: &RepoId, releases: &'a [Release]) -> Result<&'a Release> {
    if releases.is_empty() {
        return Err(BpmError::RepoNotFound(repo.to_string()).into());
    }
    releases
        .iter()
        .find(|r| !r.assets.is_empty())
        .ok_or_else(|| BpmError::AssetNotFound(repo.to_string()).into())
}
