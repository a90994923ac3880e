use anyhow::{Context, Result};
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    install::Layout,
    package::REGISTRY_FILE,
    platform::Platform,
    runtime::Runtime,
    source::{GitHubSource, ReleaseSource},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a command needs, assembled once at startup.
pub struct Config<R: Runtime, S: ReleaseSource> {
    pub runtime: R,
    pub source: S,
    pub platform: Platform,
    pub layout: Layout,
    /// Holds the registry file and, on Windows, the `app` and `bin` directories.
    pub root: PathBuf,
}

impl<R: Runtime> Config<R, GitHubSource> {
    pub fn new(
        runtime: R,
        root: Option<PathBuf>,
        prefix: PathBuf,
        api_url: Option<String>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(token) = runtime.env_var("GITHUB_TOKEN") {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("GITHUB_TOKEN is not a valid header value")?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using GITHUB_TOKEN for authentication");
        }

        let client = Client::builder()
            .user_agent(concat!("bpm/", env!("BPM_VERSION")))
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        let source = match api_url {
            Some(url) => GitHubSource::with_api_url(client, &url),
            None => GitHubSource::new(client),
        };

        let platform = Platform::detect();
        let root = match root {
            Some(root) => root,
            None => default_root(&runtime, &platform, &prefix)?,
        };
        Ok(Self::with_parts(runtime, source, platform, root, &prefix))
    }
}

impl<R: Runtime, S: ReleaseSource> Config<R, S> {
    pub fn with_parts(runtime: R, source: S, platform: Platform, root: PathBuf, prefix: &Path) -> Self {
        let layout = Layout::for_platform(&platform, &root, prefix);
        debug!("Using root {:?} and layout {:?}", root, layout);
        Self {
            runtime,
            source,
            platform,
            layout,
            root,
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    /// Writing into the real system hierarchy needs root.
    pub fn ensure_privileged(&self) -> Result<()> {
        if self.layout.needs_privilege() && !self.runtime.is_privileged() {
            anyhow::bail!(
                "Permission denied: run as root, or pass --prefix to install somewhere else."
            );
        }
        Ok(())
    }
}

/// `~/bpm` on Windows, `<prefix>/etc/bpm` elsewhere.
#[tracing::instrument(skip(runtime))]
pub fn default_root<R: Runtime>(runtime: &R, platform: &Platform, prefix: &Path) -> Result<PathBuf> {
    if platform.is_windows() {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join("bpm"))
    } else {
        Ok(prefix.join("etc/bpm"))
    }
}
