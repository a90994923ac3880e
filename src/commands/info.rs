use anyhow::Result;
use std::io::{self, Write};

use super::Config;
use crate::{
    error::BpmError, package::Package, package::Registry, runtime::Runtime,
    source::ReleaseSource,
};

/// Show the installed packages as a table, or every field of one package.
#[tracing::instrument(skip(config))]
pub fn info<R: Runtime, S: ReleaseSource>(config: &Config<R, S>, name: Option<&str>) -> Result<()> {
    let registry = Registry::load(&config.runtime, &config.registry_path())?;
    let mut out = io::stdout().lock();
    match name {
        None => write_table(&mut out, registry.packages()),
        Some(name) => {
            let pkg = registry
                .find(name)
                .1
                .ok_or_else(|| BpmError::PackageNotFound(name.to_string()))?;
            write_details(&mut out, pkg)
        }
    }
}

fn write_table<W: Write>(out: &mut W, packages: &[Package]) -> Result<()> {
    if packages.is_empty() {
        writeln!(out, "No packages installed.")?;
        return Ok(());
    }
    writeln!(out, "{:20} {:50} {:20}", "Name", "Url", "Version")?;
    for pkg in packages {
        let url = pkg.source().map(|s| s.html_url()).unwrap_or_else(|| "-".into());
        writeln!(
            out,
            "{:20} {:50} {:20}",
            pkg.name(),
            url,
            pkg.version().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn write_details<W: Write>(out: &mut W, pkg: &Package) -> Result<()> {
    let flags = pkg.flags();
    writeln!(out, "Name: {}", pkg.name())?;
    writeln!(out, "Binary: {}", pkg.binary_name())?;
    match pkg.source() {
        Some(repo) => writeln!(out, "Repository: {} ({})", repo, repo.html_url())?,
        None => writeln!(out, "Repository: -")?,
    }
    writeln!(out, "Version: {}", pkg.version().unwrap_or("-"))?;
    writeln!(out, "Asset: {}", pkg.asset_url().unwrap_or("-"))?;
    writeln!(out, "Prefer GNU: {}", flags.prefer_gnu)?;
    writeln!(out, "One binary: {}", flags.one_bin)?;
    if !flags.asset_filters.is_empty() {
        writeln!(out, "Filters: {}", flags.asset_filters.join(", "))?;
    }
    writeln!(out, "Installed files:")?;
    for path in pkg.installed_files().iter() {
        writeln!(out, "  {}", path.display())?;
    }
    Ok(())
}
