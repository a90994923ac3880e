//! Interactive asset selection.

use anyhow::Result;

use crate::error::BpmError;
use crate::runtime::Runtime;
use crate::source::AssetDescriptor;

/// Turns a candidate list into one chosen index.
#[cfg_attr(test, mockall::automock)]
pub trait AssetChooser {
    fn choose(&self, candidates: &[AssetDescriptor]) -> Result<usize>;
}

/// Prints a numbered list and reads the answer through the runtime.
///
/// `q` or closed input cancels; anything else unparsable asks again.
pub struct PromptChooser<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> PromptChooser<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }
}

impl<R: Runtime> AssetChooser for PromptChooser<'_, R> {
    fn choose(&self, candidates: &[AssetDescriptor]) -> Result<usize> {
        for (i, asset) in candidates.iter().enumerate() {
            println!("{:>3}. {}", i + 1, asset.name);
        }
        loop {
            let answer = self
                .runtime
                .prompt(&format!("Select an asset [1-{}, q to quit]:", candidates.len()))?;
            let Some(answer) = answer else {
                return Err(BpmError::Cancelled.into());
            };
            if answer.eq_ignore_ascii_case("q") {
                return Err(BpmError::Cancelled.into());
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => return Ok(n - 1),
                _ => println!("Please enter a number between 1 and {}.", candidates.len()),
            }
        }
    }
}
