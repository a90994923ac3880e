//! GitHub source implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::BpmError;

use super::{AssetDescriptor, Release, ReleaseSource, RepoId, SearchSort};

/// Repositories shown per search page.
pub const SEARCH_PAGE_SIZE: u32 = 7;

/// GitHub API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Release {
        pub tag_name: String,
        #[serde(default)]
        pub assets: Vec<Asset>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Asset {
        pub name: String,
        pub browser_download_url: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct SearchResult {
        #[serde(default)]
        pub items: Vec<SearchItem>,
    }

    #[derive(Deserialize, Debug)]
    pub struct SearchItem {
        pub full_name: String,
    }
}

/// GitHub source implementation.
pub struct GitHubSource {
    client: Client,
    api_url: String,
}

impl GitHubSource {
    /// Create a new GitHub source with default API URL.
    pub fn new(client: Client) -> Self {
        Self::with_api_url(client, "https://api.github.com")
    }

    /// Create a new GitHub source with custom API URL.
    pub fn with_api_url(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// GET a JSON document. A 404 comes back as `Ok(None)`.
    #[tracing::instrument(skip(self, query))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        debug!("GET JSON from {} with query {:?}...", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .with_context(|| format!("Request to {} failed", url))?;
        let parsed = response
            .json::<T>()
            .await
            .context("Failed to parse JSON response")?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl ReleaseSource for GitHubSource {
    async fn releases(&self, repo: &RepoId) -> Result<Vec<Release>> {
        let url = format!("{}/repos/{}/{}/releases", self.api_url, repo.owner, repo.repo);
        let releases: Vec<api::Release> = self
            .get_json(&url, &[("per_page", "100"), ("page", "1")])
            .await?
            .ok_or_else(|| BpmError::RepoNotFound(repo.to_string()))?;
        debug!("{} has {} releases", repo, releases.len());
        Ok(releases.into_iter().map(Release::from).collect())
    }

    async fn search(
        &self,
        query: &str,
        page: u32,
        sort: Option<SearchSort>,
    ) -> Result<Vec<RepoId>> {
        let url = format!("{}/search/repositories", self.api_url);
        let q = format!("{} in:name", query);
        let page = page.to_string();
        let per_page = SEARCH_PAGE_SIZE.to_string();
        let mut params = vec![("q", q.as_str()), ("page", &page), ("per_page", &per_page)];
        if let Some(sort) = sort {
            params.push(("sort", sort.as_query()));
        }

        let result: Option<api::SearchResult> = self.get_json(&url, &params).await?;
        Ok(result
            .map(|r| r.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| item.full_name.parse().ok())
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading file from {}...", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?
            .error_for_status()
            .with_context(|| format!("Failed to download {}", url))?;
        let bytes = response
            .bytes()
            .await
            .context("Failed to read download stream")?;
        debug!("Downloaded {:.2} MB", bytes.len() as f64 / (1024.0 * 1024.0));
        Ok(bytes.to_vec())
    }
}

impl From<api::Release> for Release {
    fn from(r: api::Release) -> Self {
        Release {
            tag: r.tag_name,
            assets: r.assets.into_iter().map(AssetDescriptor::from).collect(),
        }
    }
}

impl From<api::Asset> for AssetDescriptor {
    fn from(a: api::Asset) -> Self {
        AssetDescriptor {
            name: a.name,
            url: a.browser_download_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use mockito::Matcher;

    #[test]
    fn test_github_source_api_url() {
        let source = GitHubSource::new(Client::new());
        assert_eq!(source.api_url(), "https://api.github.com");

        let custom = GitHubSource::with_api_url(Client::new(), "https://custom.api/");
        assert_eq!(custom.api_url(), "https://custom.api");
    }

    #[test]
    fn test_release_conversion() {
        let api_release = api::Release {
            tag_name: "v1.0.0".into(),
            assets: vec![api::Asset {
                name: "tool-linux-amd64".into(),
                browser_download_url: "https://example.com/asset".into(),
            }],
        };

        let release: Release = api_release.into();
        assert_eq!(release.tag, "v1.0.0");
        assert_eq!(
            release.assets,
            vec![AssetDescriptor::new(
                "tool-linux-amd64",
                "https://example.com/asset"
            )]
        );
    }

    #[tokio::test]
    async fn test_releases_from_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "100".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[{"tag_name":"v2","assets":[{"name":"a.tar.gz","browser_download_url":"http://x/a.tar.gz"}]}]"#,
            )
            .create_async()
            .await;

        let source = GitHubSource::with_api_url(Client::new(), &server.url());
        let releases = source.releases(&RepoId::new("o", "r")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].tag, "v2");
        assert_eq!(releases[0].assets[0].name, "a.tar.gz");
    }

    #[tokio::test]
    async fn test_releases_missing_repo_is_repo_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/missing/releases")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let source = GitHubSource::with_api_url(Client::new(), &server.url());
        let err = source
            .releases(&RepoId::new("o", "missing"))
            .await
            .unwrap_err();
        assert_eq!(
            error::kind(&err),
            Some(&BpmError::RepoNotFound("o/missing".into()))
        );
    }

    #[tokio::test]
    async fn test_search_sends_name_query_and_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/repositories")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "eza in:name".into()),
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("per_page".into(), "7".into()),
                Matcher::UrlEncoded("sort".into(), "stars".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"items":[{"full_name":"eza-community/eza"},{"full_name":"other/eza"}]}"#,
            )
            .create_async()
            .await;

        let source = GitHubSource::with_api_url(Client::new(), &server.url());
        let repos = source
            .search("eza", 2, Some(SearchSort::Stars))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            repos,
            vec![
                RepoId::new("eza-community", "eza"),
                RepoId::new("other", "eza")
            ]
        );
    }

    #[tokio::test]
    async fn test_download_returns_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dl/a.tar.gz")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;

        let source = GitHubSource::with_api_url(Client::new(), &server.url());
        let bytes = source
            .download(&format!("{}/dl/a.tar.gz", server.url()))
            .await
            .unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[tokio::test]
    async fn test_download_error_status_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dl/gone")
            .with_status(500)
            .create_async()
            .await;

        let source = GitHubSource::with_api_url(Client::new(), &server.url());
        assert!(
            source
                .download(&format!("{}/dl/gone", server.url()))
                .await
                .is_err()
        );
    }
}
