//! Model and training data cache shared by the engines

use crate::error::OmrError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-user cache directory for downloaded engine assets
pub fn cache_dir(subdir: Option<&str>) -> Result<PathBuf, OmrError> {
    let mut dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sheet-omr");
    if let Some(subdir) = subdir {
        dir = dir.join(subdir);
    }

    std::fs::create_dir_all(&dir).map_err(|e| {
        OmrError::InitializationError(format!("Failed to create cache directory {:?}: {}", dir, e))
    })?;

    Ok(dir)
}

/// Return `dir/filename`, downloading it from `url` first if absent
pub fn ensure_cached(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OmrError> {
    let path = dir.join(filename);

    if path.exists() {
        tracing::info!("Using cached {} from {:?}", filename, path);
        return Ok(path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", filename, path);

    Ok(path)
}

/// Download a file from URL to path using ureq.
///
/// The body is written next to the target and renamed into place, so an
/// interrupted download never leaves a truncated file in the cache.
fn download_file(url: &str, path: &Path) -> Result<(), OmrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OmrError::InitializationError(format!("Failed to download {}: {}", url, e)))?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OmrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        OmrError::InitializationError(format!("Failed to create {:?}: {}", partial, e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        OmrError::InitializationError(format!("Failed to write {:?}: {}", partial, e))
    })?;

    std::fs::rename(&partial, path).map_err(|e| {
        OmrError::InitializationError(format!("Failed to move {:?} into place: {}", partial, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_file_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.rten"), b"weights").unwrap();

        // The URL is unreachable, so any download attempt would fail
        let path =
            ensure_cached("http://127.0.0.1:9/model.rten", dir.path(), "model.rten").unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"weights");
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = ensure_cached("http://127.0.0.1:9/model.rten", dir.path(), "model.rten");

        assert!(matches!(result, Err(OmrError::InitializationError(_))));
        assert!(!dir.path().join("model.rten").exists());
    }
}
