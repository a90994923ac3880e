use crate::runtime::Runtime;
use anyhow::{Result, anyhow};
use log::{debug, info};
use std::io::Cursor;
use std::path::Path;

use super::ArchiveExtractor;

/// Extractor for .7z archives.
///
/// `sevenz-rust` writes straight to disk, so this one bypasses the runtime
/// for file contents.
pub struct SevenZExtractor;

impl ArchiveExtractor for SevenZExtractor {
    fn can_handle(&self, name: &str) -> bool {
        name.to_lowercase().ends_with(".7z")
    }

    fn extract<R: Runtime>(&self, runtime: &R, bytes: &[u8], extract_to: &Path) -> Result<()> {
        debug!("Extracting 7z archive to {:?}...", extract_to);
        runtime.create_dir_all(extract_to)?;
        sevenz_rust::decompress(Cursor::new(bytes), extract_to)
            .map_err(|e| anyhow!("Failed to extract 7z archive: {}", e))?;
        info!("Extraction complete.");
        Ok(())
    }
}
