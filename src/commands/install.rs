use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use super::Config;
use crate::{
    archive::Extractor,
    asset::{PromptChooser, ResolveContext, resolve},
    error::BpmError,
    install::{self, ConflictPolicy, ExecMode, InstallOptions},
    package::{Manifest, Package, PackageFlags, Registry},
    runtime::Runtime,
    source::{ReleaseSource, RepoId, SearchSort, latest_with_assets},
};

/// A validated `bpm install` invocation.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    names: Vec<String>,
    bin_name: Option<String>,
    local: Option<PathBuf>,
    quiet: bool,
    interactive: bool,
    mode: ExecMode,
    sort: Option<SearchSort>,
    flags: PackageFlags,
}

impl InstallRequest {
    pub fn builder(names: Vec<String>) -> InstallRequestBuilder {
        InstallRequestBuilder {
            names,
            ..Default::default()
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecMode::DryRun
    }
}

#[derive(Debug, Default)]
pub struct InstallRequestBuilder {
    names: Vec<String>,
    bin_name: Option<String>,
    local: Option<PathBuf>,
    quiet: bool,
    interactive: bool,
    dry_run: bool,
    sort: Option<SearchSort>,
    flags: PackageFlags,
}

impl InstallRequestBuilder {
    pub fn bin_name(mut self, bin_name: Option<String>) -> Self {
        self.bin_name = bin_name;
        self
    }

    /// Install from an archive on disk instead of a release download.
    pub fn local(mut self, local: Option<PathBuf>) -> Self {
        self.local = local;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn sort(mut self, sort: Option<SearchSort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn prefer_gnu(mut self, prefer_gnu: bool) -> Self {
        self.flags.prefer_gnu = prefer_gnu;
        self
    }

    pub fn one_bin(mut self, one_bin: bool) -> Self {
        self.flags.one_bin = one_bin;
        self
    }

    pub fn filters(mut self, filters: Vec<String>) -> Self {
        self.flags.asset_filters = filters;
        self
    }

    pub fn build(self) -> Result<InstallRequest> {
        if self.names.is_empty() {
            return Err(invalid("no package given"));
        }
        if self.quiet && self.interactive {
            return Err(invalid("--interactive and --quiet cannot be used together"));
        }
        if self.local.is_some() && self.names.len() != 1 {
            return Err(invalid("--local installs exactly one package"));
        }
        if self.bin_name.is_some() && self.names.len() != 1 {
            return Err(invalid("--bin-name applies to a single package"));
        }

        Ok(InstallRequest {
            names: self.names,
            bin_name: self.bin_name,
            local: self.local,
            quiet: self.quiet,
            interactive: self.interactive,
            mode: if self.dry_run {
                ExecMode::DryRun
            } else {
                ExecMode::Apply
            },
            sort: self.sort,
            flags: self.flags,
        })
    }
}

fn invalid(msg: &str) -> anyhow::Error {
    BpmError::InvalidOptions(msg.to_string()).into()
}

/// Install every package of `request`, one at a time.
///
/// The first failure stops the batch; that package has already been rolled
/// back and nothing was added to the registry for it.
#[tracing::instrument(skip(config, request))]
pub async fn install<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    request: &InstallRequest,
) -> Result<()> {
    if !request.is_dry_run() {
        config.ensure_privileged()?;
    }
    let mut registry = Registry::load(&config.runtime, &config.registry_path())?;

    for name in request.names() {
        install_one(config, &mut registry, request, name)
            .await
            .with_context(|| format!("Failed to install {}", name))?;
    }
    Ok(())
}

async fn install_one<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    registry: &mut Registry<'_, R>,
    request: &InstallRequest,
    name: &str,
) -> Result<()> {
    let (pkg_name, source) = match RepoId::from_url(name) {
        Some(repo) => (repo.repo.clone(), Some(repo)),
        None => (name.to_string(), None),
    };
    if registry.find(&pkg_name).1.is_some() {
        println!("   {} is already installed, skipping", pkg_name);
        return Ok(());
    }

    let mut pkg = Package::builder(pkg_name)
        .bin_name(request.bin_name.clone())
        .source(source)
        .flags(request.flags.clone())
        .build()?;

    let (bytes, asset_name) = match &request.local {
        Some(path) => read_local(&config.runtime, path)?,
        None => {
            let repo = match pkg.source() {
                Some(repo) => repo.clone(),
                None => {
                    let repo = search_repo(config, pkg.name(), request).await?;
                    pkg.set_source(repo.clone());
                    repo
                }
            };
            println!("   resolving {}", repo);
            let releases = config.source.releases(&repo).await?;
            let release = latest_with_assets(&repo, &releases)?;
            let ctx = resolve_context(config, pkg.flags()).interactive(request.interactive);
            let asset = resolve(&release.assets, &ctx, &PromptChooser::new(&config.runtime))?;
            info!("Selected {} from {} {}", asset.name, repo, release.tag);

            println!("   downloading {}", asset.name);
            let bytes = config.source.download(&asset.url).await?;
            let asset_name = asset.name.clone();
            pkg.set_release(release.tag.clone(), asset)?;
            (bytes, asset_name)
        }
    };

    let options = InstallOptions::new(ConflictPolicy::Rename, request.mode);
    let manifest = deploy(config, &pkg, &bytes, &asset_name, &options)?;
    pkg.set_installed_files(manifest);

    if options.is_dry_run() {
        print_plan(&pkg);
        return Ok(());
    }

    // Files without a registry entry could never be removed again.
    let installed = pkg.installed_files().clone();
    let summary = format!("{} {}", pkg.name(), pkg.version().unwrap_or("(local)"));
    if let Err(e) = registry.insert(pkg) {
        warn!("Registering {} failed, rolling back: {:#}", summary, e);
        if let Err(undo) = install::rollback(&config.runtime, &installed) {
            error!("Rollback incomplete: {:#}", undo);
        }
        return Err(e);
    }
    println!("   installed {}", summary);
    Ok(())
}

fn read_local<R: Runtime>(runtime: &R, path: &Path) -> Result<(Vec<u8>, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BpmError::InvalidOptions(format!("{:?} is not an archive", path)))?
        .to_string();
    println!("   reading {}", path.display());
    let bytes = runtime
        .read(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    Ok((bytes, name))
}

/// Resolution inputs from the host platform and a package's stored flags.
pub(super) fn resolve_context<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    flags: &PackageFlags,
) -> ResolveContext {
    ResolveContext::new(config.platform.clone())
        .prefer_gnu(flags.prefer_gnu)
        .filters(flags.asset_filters.clone())
}

/// Extract `bytes` into a scratch directory and install the result.
pub(super) fn deploy<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    pkg: &Package,
    bytes: &[u8],
    asset_name: &str,
    options: &InstallOptions,
) -> Result<Manifest> {
    let work_dir = tempfile::Builder::new()
        .prefix("bpm-")
        .tempdir()
        .context("Failed to create a scratch directory")?;
    let root = Extractor::new(config.platform.is_windows()).extract(
        &config.runtime,
        bytes,
        asset_name,
        work_dir.path(),
    )?;
    debug!("Installing {} from {:?}", pkg.name(), root);
    crate::install::install(&config.runtime, &config.layout, &root, pkg, options)
}

fn print_plan(pkg: &Package) {
    println!("   dry run: {} would install", pkg.name());
    for path in pkg.installed_files().iter() {
        println!("      {}", path.display());
    }
}

/// Find the repository for a bare package name.
///
/// Quiet mode takes the best match; otherwise the user pages through results.
async fn search_repo<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    query: &str,
    request: &InstallRequest,
) -> Result<RepoId> {
    println!("   searching {}", query);
    let mut page = 1;
    let mut repos = config.source.search(query, page, request.sort).await?;
    if repos.is_empty() {
        return Err(BpmError::RepoNotFound(query.to_string()).into());
    }
    if request.quiet {
        info!("Using first search result {}", repos[0]);
        return Ok(repos.swap_remove(0));
    }

    loop {
        for (i, repo) in repos.iter().enumerate() {
            println!("{:>3}. {:40} {}", i + 1, repo.to_string(), repo.html_url());
        }
        let answer = config.runtime.prompt(&format!(
            "Select a repository [1-{}, m: more, p: previous, q: quit]:",
            repos.len()
        ))?;
        let Some(answer) = answer else {
            return Err(BpmError::Cancelled.into());
        };

        match answer.to_lowercase().as_str() {
            "q" => return Err(BpmError::Cancelled.into()),
            "m" => {
                let next = config.source.search(query, page + 1, request.sort).await?;
                if next.is_empty() {
                    println!("No more results.");
                } else {
                    page += 1;
                    repos = next;
                }
            }
            "p" if page == 1 => println!("Already on the first page."),
            "p" => {
                let previous = config.source.search(query, page - 1, request.sort).await?;
                if !previous.is_empty() {
                    page -= 1;
                    repos = previous;
                }
            }
            other => match other.parse::<usize>() {
                Ok(n) if (1..=repos.len()).contains(&n) => return Ok(repos.swap_remove(n - 1)),
                _ => println!("Please enter a number between 1 and {}.", repos.len()),
            },
        }
    }
}
