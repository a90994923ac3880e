use anyhow::{Context, Result};
use log::{debug, info};

use super::install::{deploy, resolve_context};
use super::{Config, Tally};
use crate::{
    asset::{PromptChooser, resolve},
    error::BpmError,
    install::{ConflictPolicy, ExecMode, InstallOptions},
    package::Registry,
    runtime::Runtime,
    source::{ReleaseSource, latest_with_assets},
};

/// Bring packages up to the newest release of their stored repository.
///
/// With no names every registered package is checked. The asset is resolved
/// again from the stored flags, never interactively; the repository itself is
/// not searched again.
#[tracing::instrument(skip(config))]
pub async fn update<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    names: &[String],
    dry_run: bool,
) -> Result<()> {
    let mode = if dry_run {
        ExecMode::DryRun
    } else {
        config.ensure_privileged()?;
        ExecMode::Apply
    };
    let mut registry = Registry::load(&config.runtime, &config.registry_path())?;
    let names: Vec<String> = if names.is_empty() {
        registry.packages().iter().map(|p| p.name().to_string()).collect()
    } else {
        names.to_vec()
    };
    if names.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    let mut tally = Tally::default();
    for name in &names {
        match update_one(config, &mut registry, name, mode).await {
            Ok(()) => tally.success(),
            Err(e) => tally.failure(name, &e),
        }
    }
    tally.finish("Update")
}

async fn update_one<R: Runtime, S: ReleaseSource>(
    config: &Config<R, S>,
    registry: &mut Registry<'_, R>,
    name: &str,
    mode: ExecMode,
) -> Result<()> {
    let mut pkg = registry
        .find(name)
        .1
        .cloned()
        .ok_or_else(|| BpmError::PackageNotFound(name.to_string()))?;
    let Some(repo) = pkg.source().cloned() else {
        println!("   {} was installed from a local archive, skipping", name);
        return Ok(());
    };

    println!("   resolving {}", repo);
    let releases = config.source.releases(&repo).await?;
    let release = latest_with_assets(&repo, &releases)?;
    if pkg.version() == Some(release.tag.as_str()) {
        println!("   {} is up to date ({})", name, release.tag);
        return Ok(());
    }

    let ctx = resolve_context(config, pkg.flags());
    let asset = resolve(&release.assets, &ctx, &PromptChooser::new(&config.runtime))?;
    info!("Selected {} from {} {}", asset.name, repo, release.tag);

    println!("   downloading {}", asset.name);
    let bytes = config.source.download(&asset.url).await?;
    let options = InstallOptions::new(ConflictPolicy::Overwrite, mode);
    let manifest = deploy(config, &pkg, &bytes, &asset.name, &options)
        .with_context(|| format!("Failed to update {}", name))?;

    let previous = pkg.version().unwrap_or("(unknown)").to_string();
    if options.is_dry_run() {
        println!("   dry run: {} {} -> {} would install", name, previous, release.tag);
        for path in manifest.iter() {
            println!("      {}", path.display());
        }
        return Ok(());
    }

    debug!("Merging {} new path(s) into {}", manifest.len(), name);
    pkg.set_release(release.tag.clone(), asset)?;
    pkg.installed_files_mut().merge(manifest);
    println!("   updated {} {} -> {}", name, previous, release.tag);
    registry.insert(pkg)
}
