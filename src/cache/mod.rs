//! Cache module for persisting upstream responses to disk
//!
//! A single JSON document holds every cached category. The store handles raw
//! file access; the manager owns the expiry policy and invalidation.

mod manager;
mod store;

pub use manager::{ttl_from_hours, BatchCount, CacheInfo, CacheManager, TtlScope};
pub use store::{CacheDocument, CategoryMap, PersistentStore};
