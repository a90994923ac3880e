use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::Cursor;
use std::path::Path;
use zip::ZipArchive;

use super::ArchiveExtractor;

/// Extractor for .zip archives
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn can_handle(&self, name: &str) -> bool {
        name.to_lowercase().ends_with(".zip")
    }

    fn extract<R: Runtime>(&self, runtime: &R, bytes: &[u8], extract_to: &Path) -> Result<()> {
        debug!("Extracting zip archive to {:?}...", extract_to);
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).with_context(|| "Failed to parse ZIP archive")?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry {}", i))?;

            let entry_path = match entry.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => {
                    warn!("Skipping ZIP entry with unsafe path `{}`", entry.name());
                    continue;
                }
            };

            let full_path = extract_to.join(&entry_path);

            if entry.is_dir() {
                runtime.create_dir_all(&full_path)?;
            } else {
                if let Some(parent) = full_path.parent() {
                    runtime.create_dir_all(parent)?;
                }
                let mut dest_file = runtime.create_file(&full_path)?;
                std::io::copy(&mut entry, &mut dest_file)
                    .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                drop(dest_file);

                // Set file permissions from archive metadata (Unix only)
                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode()
                    && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                {
                    debug!("Failed to set permissions on {:?}: {}", full_path, e);
                }
            }
        }

        info!("Extraction complete.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_archives;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_can_handle_zip() {
        let extractor = ZipExtractor;
        assert!(extractor.can_handle("file.zip"));
        assert!(extractor.can_handle("FILE.ZIP"));
        assert!(!extractor.can_handle("file.tar.gz"));
        assert!(!extractor.can_handle("file.tgz"));
    }

    #[test]
    fn test_extract_archive_with_multiple_toplevel_dirs() -> Result<()> {
        let dir = tempdir()?;
        let bytes = test_archives::zip(&[("foo/file1.txt", "foo1"), ("bar/file2.txt", "bar2")]);

        ZipExtractor.extract(&RealRuntime, &bytes, dir.path())?;

        assert_eq!(fs::read_to_string(dir.path().join("foo/file1.txt"))?, "foo1");
        assert_eq!(fs::read_to_string(dir.path().join("bar/file2.txt"))?, "bar2");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_keeps_unix_mode() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir()?;
        let bytes = test_archives::zip(&[("tool", "#!/bin/sh")]);

        ZipExtractor.extract(&RealRuntime, &bytes, dir.path())?;

        let mode = fs::metadata(dir.path().join("tool"))?.permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        Ok(())
    }

    #[test]
    fn test_extract_writes_through_runtime() -> Result<()> {
        let bytes = test_archives::zip(&[("app/app", "bin")]);
        let mut runtime = MockRuntime::new();
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime
            .expect_create_file()
            .withf(|p| p == Path::new("/work/app/app"))
            .times(1)
            .returning(|_| Ok(Box::new(std::io::sink())));
        runtime.expect_set_permissions().returning(|_, _| Ok(()));

        ZipExtractor.extract(&runtime, &bytes, Path::new("/work"))?;
        Ok(())
    }

    #[test]
    fn test_extract_corrupted_archive() {
        let dir = tempdir().unwrap();
        let result = ZipExtractor.extract(&RealRuntime, b"corrupted data", dir.path());
        assert!(result.is_err());
    }
}
