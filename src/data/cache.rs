//! On-disk copy of the last good testing-feed response.
//!
//! Assumes a single pipeline runner: the file is read and overwritten without
//! locking.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct TestingCache {
    path: PathBuf,
}

impl TestingCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached body, or [`PipelineError::CacheMiss`] if none was stored.
    pub fn load(&self) -> Result<String, PipelineError> {
        match fs::read_to_string(&self.path) {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PipelineError::CacheMiss {
                path: self.path.display().to_string(),
            }),
            Err(e) => Err(PipelineError::Io {
                context: format!("failed to read cache '{}'", self.path.display()),
                source: e,
            }),
        }
    }

    /// Replace the cached body.
    ///
    /// Writes a sibling temp file and renames it over the old copy, so a failed
    /// write leaves the previous cache intact.
    pub fn store(&self, body: &str) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::Io {
                context: format!("failed to create cache dir '{}'", parent.display()),
                source: e,
            })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body).map_err(|e| PipelineError::Io {
            context: format!("failed to write cache '{}'", tmp.display()),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| PipelineError::Io {
            context: format!("failed to replace cache '{}'", self.path.display()),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TestingCache::new(dir.path().join("testing_us.json"));
        assert!(matches!(cache.load(), Err(PipelineError::CacheMiss { .. })));
    }

    #[test]
    fn store_overwrites_previous_copy() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TestingCache::new(dir.path().join("nested").join("testing_us.json"));
        cache.store("[1]").unwrap();
        cache.store("[2]").unwrap();
        assert_eq!(cache.load().unwrap(), "[2]");
        assert!(!dir.path().join("nested").join("testing_us.json.tmp").exists());
    }
}
