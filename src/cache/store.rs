//! Single-file JSON persistence for the cache document
//!
//! Loading never fails: a missing, unreadable or corrupt file is treated as an
//! empty document. Saving is best-effort and goes through a temp file that is
//! renamed over the target, so a reader never observes a half-written file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Entries of one category, keyed by batch (or other partition key)
pub type CategoryMap = BTreeMap<String, Value>;

/// The entire on-disk cache state
///
/// `last_fetch_time` is kept as the raw string found on disk so that an
/// unparsable timestamp survives a load/save cycle and still reads as invalid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    #[serde(default)]
    pub last_fetch_time: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, CategoryMap>,
}

impl CacheDocument {
    /// Looks up `data[category][key]`
    pub fn entry(&self, category: &str, key: &str) -> Option<&Value> {
        self.data.get(category)?.get(key)
    }
}

/// Reads and writes a single `CacheDocument` file
#[derive(Debug, Clone)]
pub struct PersistentStore {
    path: PathBuf,
}

impl PersistentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the document, falling back to an empty one on any failure
    pub fn load(&self) -> CacheDocument {
        match self.try_load() {
            Ok(doc) => doc,
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => CacheDocument::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable cache file");
                CacheDocument::default()
            }
        }
    }

    fn try_load(&self) -> Result<CacheDocument, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persists the document; failures are logged and swallowed
    pub fn save(&self, doc: &CacheDocument) {
        if let Err(e) = self.try_save(doc) {
            warn!(path = %self.path.display(), error = %e, "Failed to save cache file");
        }
    }

    fn try_save(&self, doc: &CacheDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), "Cache file saved");
        Ok(())
    }

    /// Deletes the backing file; a missing file is not an error
    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Cache file removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove cache file"),
        }
    }

    /// Sibling temp file, unique per process so concurrent processes never share one
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
    }
}
