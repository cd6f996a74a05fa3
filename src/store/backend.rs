//! Persistence backends for the block-list store.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::BlockSet;
use crate::error::{Error, Result};

/// Persistence seam for the block-list store.
///
/// Backends persist the full snapshot on every save; there is no
/// incremental format. The store treats the in-memory snapshot as
/// authoritative, so `save` failures are logged upstream rather than
/// propagated.
pub trait StoreBackend: Send + Sync {
    /// Load the persisted set. No prior state yields an empty set.
    fn load(&self) -> Result<BlockSet>;

    /// Persist the full snapshot.
    fn save(&self, set: &BlockSet) -> Result<()>;
}

/// JSON file persistence under the platform config directory.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Create a backend persisting to the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default persistence path (`<config dir>/blocklist.json`).
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("io", "appwall", "appwall").map_or_else(
            || PathBuf::from("blocklist.json"),
            |dirs| dirs.config_dir().join("blocklist.json"),
        )
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<BlockSet> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted block list, starting empty");
            return Ok(BlockSet::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Store(format!("failed to read block list: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Store(format!("failed to parse block list: {e}")))
    }

    fn save(&self, set: &BlockSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Store(format!("failed to create config dir: {e}")))?;
        }

        let content = serde_json::to_string_pretty(set)
            .map_err(|e| Error::Store(format!("failed to serialize block list: {e}")))?;

        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| Error::Store(format!("failed to write block list: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Store(format!("failed to replace block list: {e}")))?;

        Ok(())
    }
}

/// In-memory backend for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBackend {
    saved: Mutex<BlockSet>,
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<BlockSet> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, set: &BlockSet) -> Result<()> {
        *self.saved.lock() = set.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppId;

    #[test]
    fn test_json_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("blocklist.json"));

        let set: BlockSet = [AppId::from("com.example.a"), AppId::from("com.example.b")]
            .into_iter()
            .collect();

        backend.save(&set).unwrap();
        let loaded = backend.load().unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_json_backend_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nope.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_backend_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested/deep/blocklist.json"));
        backend.save(&BlockSet::new()).unwrap();
        assert!(backend.path().exists());
    }

    #[test]
    fn test_json_backend_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.json");
        std::fs::write(&path, "not json").unwrap();

        let backend = JsonFileBackend::new(path);
        assert!(backend.load().is_err());
    }
}
