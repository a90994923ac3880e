//! Registering a directory on the per-user `PATH` of a Windows host.
//!
//! The value lives under `HKCU\Environment` and is edited with `reg.exe`, the
//! same way a user would from a shell. The previous value is saved next to it
//! as `PATH_<unix seconds>` before it is replaced.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::Path;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use super::RealRuntime;

const ENVIRONMENT_KEY: &str = r"HKCU\Environment";

/// Type and value of `PATH` in the output of `reg query`.
pub(crate) fn parse_reg_query(stdout: &str) -> Option<(String, String)> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split("    ").map(str::trim).filter(|f| !f.is_empty());
        let name = fields.next()?;
        if !name.eq_ignore_ascii_case("PATH") {
            return None;
        }
        let kind = fields.next()?.to_string();
        let value = fields.collect::<Vec<_>>().join("    ");
        Some((kind, value))
    })
}

/// `current` with `dir` in front, or `None` when `dir` is already listed.
pub(crate) fn prepend_entry(current: &str, dir: &str) -> Option<String> {
    let normalized = |entry: &str| entry.trim().trim_end_matches('\\').to_lowercase();
    let wanted = normalized(dir);
    if current.split(';').any(|entry| normalized(entry) == wanted) {
        return None;
    }
    if current.trim().is_empty() {
        Some(dir.to_string())
    } else {
        Some(format!("{};{}", dir, current))
    }
}

fn reg(args: &[&str]) -> Result<std::process::Output> {
    Command::new("reg")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run reg {}", args.join(" ")))
}

fn reg_add(name: &str, kind: &str, value: &str) -> Result<()> {
    let output = reg(&["add", ENVIRONMENT_KEY, "/t", kind, "/v", name, "/d", value, "/f"])?;
    if !output.status.success() {
        bail!(
            "reg add {} failed: {}",
            name,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn ensure_user_path_impl(&self, dir: &Path) -> Result<bool> {
        if !cfg!(windows) {
            debug!("Not a Windows host, leaving PATH alone");
            return Ok(false);
        }

        let query = reg(&["query", ENVIRONMENT_KEY, "/v", "PATH"])?;
        let (kind, current) = if query.status.success() {
            parse_reg_query(&String::from_utf8_lossy(&query.stdout))
                .unwrap_or_else(|| ("REG_SZ".to_string(), String::new()))
        } else {
            debug!("User PATH is not set yet");
            ("REG_SZ".to_string(), String::new())
        };

        let dir = dir.to_string_lossy();
        let Some(updated) = prepend_entry(&current, &dir) else {
            debug!("{} is already on PATH", dir);
            return Ok(false);
        };

        if !current.is_empty() {
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            reg_add(&format!("PATH_{}", stamp), &kind, &current)?;
        }
        reg_add("PATH", &kind, &updated)?;
        warn!(
            "{} added to PATH. Open a new terminal, or sign in again, to pick it up.",
            dir
        );
        Ok(true)
    }
}
