//! Cache manager with a single, document-wide expiry clock
//!
//! Every `put` stamps `last_fetch_time` for the whole document, so one fresh
//! write makes every entry valid again and no entry ever expires on its own.
//! Read-modify-write operations are serialized through a shared lock.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::store::{CacheDocument, CategoryMap, PersistentStore};
use crate::data::{category, student_count};

/// Scope of the expiry clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlScope {
    /// One timestamp for the whole document
    Global,
}

/// Student count for one cached batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCount {
    /// Batch key under the `students` category
    pub batch: String,
    /// Length of the cached roster; zero flags a suspicious entry
    pub student_count: usize,
}

/// Read-only introspection of the cache file
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// Path of the backing file as configured
    pub cache_file: String,
    /// Whether the backing file is present on disk
    pub cache_exists: bool,
    /// Raw document timestamp, if any
    pub last_fetch_time: Option<String>,
    /// Whether the document is within its TTL right now
    pub is_valid: bool,
    pub ttl_hours: i64,
    pub ttl_scope: TtlScope,
    /// Every cached roster with its size, ordered by batch name
    pub cached_batches: Vec<BatchCount>,
}

/// Converts a TTL in hours, or `None` if it does not fit a `chrono::Duration`
pub fn ttl_from_hours(hours: u64) -> Option<Duration> {
    i64::try_from(hours).ok().and_then(Duration::try_hours)
}

/// Manages the persisted cache document
///
/// Clones share the same write lock, so the request path and the health
/// monitor can each hold a handle without losing each other's updates.
#[derive(Debug, Clone)]
pub struct CacheManager {
    store: PersistentStore,
    ttl: Duration,
    ttl_scope: TtlScope,
    write_lock: Arc<Mutex<()>>,
}

impl CacheManager {
    /// Creates a manager for the cache file at `path`
    ///
    /// # Arguments
    /// * `path` - Location of the JSON document; its directory is created on first write
    /// * `ttl_hours` - Lifetime of the whole document after the most recent `put`.
    ///   Values too large to represent never expire.
    pub fn new(path: impl Into<PathBuf>, ttl_hours: u64) -> Self {
        Self {
            store: PersistentStore::new(path),
            ttl: ttl_from_hours(ttl_hours).unwrap_or(Duration::MAX),
            ttl_scope: TtlScope::Global,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Overrides the TTL with an arbitrary duration
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // A panic while holding the guard cannot leave the file half-written
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the document's global timestamp is within the TTL right now
    pub fn is_valid(&self, doc: &CacheDocument) -> bool {
        self.is_valid_at(doc, Utc::now())
    }

    /// Whether the document's global timestamp is within the TTL at `now`
    pub fn is_valid_at(&self, doc: &CacheDocument, now: DateTime<Utc>) -> bool {
        match doc.last_fetch_time.as_deref().and_then(parse_timestamp) {
            Some(fetched_at) => now - fetched_at < self.ttl,
            None => false,
        }
    }

    /// Returns `data[category][key]` only while the document is valid
    pub fn get(&self, category: &str, key: &str) -> Option<Value> {
        let doc = self.store.load();
        if !self.is_valid(&doc) {
            debug!(category, key, "Cache miss: document expired or empty");
            return None;
        }
        doc.entry(category, key).cloned()
    }

    /// Returns `data[category][key]` whether or not the document is still valid
    pub fn peek(&self, category: &str, key: &str) -> Option<Value> {
        self.store.load().entry(category, key).cloned()
    }

    /// Returns a whole category while the document is valid
    pub fn category(&self, category: &str) -> Option<CategoryMap> {
        let doc = self.store.load();
        if !self.is_valid(&doc) {
            return None;
        }
        Some(doc.data.get(category).cloned().unwrap_or_default())
    }

    /// Stores a value and resets the expiry clock for the whole document
    ///
    /// Every other entry becomes valid again along with this one. Write
    /// failures are logged by the store and otherwise ignored.
    ///
    /// # Arguments
    /// * `category` - First-level namespace (e.g., "students")
    /// * `key` - Entry key within the category (e.g., "batch24-28")
    /// * `value` - Payload stored as-is
    pub fn put(&self, category: &str, key: &str, value: Value) {
        let _guard = self.lock();
        let mut doc = self.store.load();
        doc.data
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), value);
        doc.last_fetch_time = Some(Utc::now().to_rfc3339());
        self.store.save(&doc);
        debug!(category, key, "Cached value");
    }

    /// Removes one entry without touching the expiry clock
    ///
    /// Returns whether an entry was present.
    pub fn invalidate(&self, category: &str, key: &str) -> bool {
        let _guard = self.lock();
        let mut doc = self.store.load();
        let removed = doc
            .data
            .get_mut(category)
            .and_then(|entries| entries.remove(key))
            .is_some();
        if removed {
            self.store.save(&doc);
            info!(category, key, "Invalidated cache entry");
        }
        removed
    }

    /// Removes an entry only if it still equals `expected`
    ///
    /// Lets a repair pass evict what it audited without clobbering a value a
    /// concurrent fetch wrote in the meantime.
    pub fn invalidate_if_unchanged(&self, category: &str, key: &str, expected: &Value) -> bool {
        let _guard = self.lock();
        let mut doc = self.store.load();
        let Some(entries) = doc.data.get_mut(category) else {
            return false;
        };
        if entries.get(key) != Some(expected) {
            debug!(category, key, "Entry changed since audit; leaving it in place");
            return false;
        }
        entries.remove(key);
        self.store.save(&doc);
        info!(category, key, "Invalidated cache entry");
        true
    }

    /// Deletes the backing file
    pub fn invalidate_all(&self) {
        let _guard = self.lock();
        self.store.remove();
        info!(path = %self.store.path().display(), "Cleared entire cache");
    }

    /// Summarizes the cache file for admin tooling
    pub fn describe(&self) -> CacheInfo {
        let doc = self.store.load();
        let cached_batches = doc
            .data
            .get(category::STUDENTS)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(batch, value)| BatchCount {
                        batch: batch.clone(),
                        student_count: student_count(value),
                    })
                    .collect()
            })
            .unwrap_or_default();

        CacheInfo {
            cache_file: self.store.path().display().to_string(),
            cache_exists: self.store.exists(),
            is_valid: self.is_valid(&doc),
            last_fetch_time: doc.last_fetch_time,
            ttl_hours: self.ttl.num_hours(),
            ttl_scope: self.ttl_scope,
            cached_batches,
        }
    }
}

/// Parses RFC 3339 timestamps, or naive ISO-8601 ones interpreted as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
