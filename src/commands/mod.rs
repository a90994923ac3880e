//! Subcommands of the `bpm` binary.
//!
//! Each command takes a [`Config`] so tests can swap in a mock runtime and a
//! mock release source.

use anyhow::{Result, anyhow};
use log::error;

mod alias;
pub mod config;
mod info;
mod install;
mod remove;
mod update;

pub use alias::alias;
pub use config::Config;
pub use info::info;
pub use install::{InstallRequest, InstallRequestBuilder, install};
pub use remove::remove;
pub use update::update;

/// Outcome of a batch command over several package names.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    succeeded: usize,
    failed: Vec<String>,
}

impl Tally {
    pub(crate) fn success(&mut self) {
        self.succeeded += 1;
    }

    pub(crate) fn failure(&mut self, name: &str, err: &anyhow::Error) {
        error!("{}: {:#}", name, err);
        self.failed.push(name.to_string());
    }

    fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// Print the summary line; any failure makes the whole command fail.
    pub(crate) fn finish(self, action: &str) -> Result<()> {
        println!(
            "{}: {} attempted, {} succeeded, {} failed",
            action,
            self.total(),
            self.succeeded,
            self.failed.len()
        );
        if self.failed.is_empty() {
            Ok(())
        } else {
            println!("Failed: {}", self.failed.join(", "));
            Err(anyhow!("{} failed for: {}", action, self.failed.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_reports_failures() {
        let mut tally = Tally::default();
        tally.success();
        tally.failure("eza", &anyhow!("boom"));
        assert_eq!(tally.total(), 2);

        let err = tally.finish("Remove").unwrap_err();
        assert_eq!(err.to_string(), "Remove failed for: eza");
    }

    #[test]
    fn test_tally_all_succeeded() {
        let mut tally = Tally::default();
        tally.success();
        assert!(tally.finish("Update").is_ok());
    }
}
