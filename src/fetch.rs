//! Self-healing fetch-through path
//!
//! Record-set categories distinguish a legitimately empty batch from a stale
//! or transiently empty one, retry the upstream, and fall back to whatever
//! the cache last held. Scalar categories fetch once and propagate failures.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::data::{empty_record_set, record_count, KnownEmptySet};
use crate::error::{FetchError, UpstreamError};

/// Retry behavior for record-set fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total upstream attempts, including the first
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Decides between cache hit, stale entry and upstream fetch
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    cache: CacheManager,
    known_empty: Arc<KnownEmptySet>,
    retry: RetryPolicy,
}

impl FetchOrchestrator {
    pub fn new(cache: CacheManager, known_empty: KnownEmptySet, retry: RetryPolicy) -> Self {
        Self {
            cache,
            known_empty: Arc::new(known_empty),
            retry,
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Fetch-through for a category whose value is `{ list_field: [...] }`
    ///
    /// A cached non-empty value is returned as-is. A cached empty value is
    /// evicted and refetched unless `key` is known to be empty. Up to
    /// `max_retries` upstream calls are made; the first non-empty result is
    /// cached and returned.
    ///
    /// # Arguments
    /// * `category` - Cache namespace (e.g., "students")
    /// * `key` - Entry key, also matched against the known-empty set
    /// * `list_field` - Field holding the record list inside the payload
    /// * `fetch` - Produces one upstream call per invocation
    ///
    /// # Returns
    /// * `Ok(value)` with fresh data, else the previously cached value, else
    ///   the last empty upstream result, else `{ list_field: [] }`
    /// * `Err` only when the upstream reports a non-transient failure and
    ///   nothing cached or fetched can stand in for it
    pub async fn fetch_record_set<F, Fut>(
        &self,
        category: &str,
        key: &str,
        list_field: &str,
        mut fetch: F,
    ) -> Result<Value, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, UpstreamError>>,
    {
        let known_empty = self.known_empty.contains(key);

        let stale = match self.cache.get(category, key) {
            Some(cached) if record_count(&cached, list_field) > 0 => {
                debug!(category, key, "Cache hit");
                return Ok(cached);
            }
            Some(cached) if known_empty => {
                debug!(category, key, "Cache hit on known-empty batch");
                return Ok(cached);
            }
            Some(cached) => {
                if !self.evict_empty(category, key, &cached) {
                    if let Some(fresh) = self.cache.get(category, key) {
                        if record_count(&fresh, list_field) > 0 {
                            debug!(category, key, "Entry refilled concurrently");
                            return Ok(fresh);
                        }
                    }
                }
                Some(cached)
            }
            // An expired entry is still better than nothing if the upstream fails
            None => self.cache.peek(category, key),
        };

        let attempts = self.retry.max_retries.max(1);
        let mut last_result = None;

        for attempt in 1..=attempts {
            match fetch().await {
                Ok(result) if record_count(&result, list_field) > 0 || known_empty => {
                    debug!(category, key, attempt, "Fetched from upstream");
                    self.cache.put(category, key, result.clone());
                    return Ok(result);
                }
                Ok(result) => {
                    warn!(category, key, attempt, attempts, "Upstream returned no records");
                    last_result = Some(result);
                }
                Err(e) if e.is_transient() => {
                    warn!(category, key, attempt, attempts, error = %e, "Upstream fetch failed");
                }
                Err(e) => {
                    warn!(category, key, error = %e, "Upstream rejected request; not retrying");
                    return stale.or(last_result).ok_or(FetchError::Upstream(e));
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry.backoff).await;
            }
        }

        if let Some(value) = stale {
            warn!(category, key, "Retries exhausted; serving previously cached value");
            return Ok(value);
        }
        if let Some(value) = last_result {
            warn!(category, key, "Retries exhausted; serving empty upstream result");
            return Ok(value);
        }
        warn!(category, key, "Retries exhausted with no data; serving empty record set");
        Ok(empty_record_set(list_field))
    }

    /// Drops an empty entry unless another writer replaced it since it was read
    fn evict_empty(&self, category: &str, key: &str, cached: &Value) -> bool {
        let evicted = self.cache.invalidate_if_unchanged(category, key, cached);
        if evicted {
            info!(category, key, "Cached entry is empty; invalidated and refetching");
        }
        evicted
    }

    /// Fetch-through for single documents: one upstream call, errors propagate
    pub async fn fetch_value<F, Fut>(&self, category: &str, key: &str, fetch: F) -> Result<Value, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, UpstreamError>>,
    {
        if let Some(cached) = self.cache.get(category, key) {
            debug!(category, key, "Cache hit");
            return Ok(cached);
        }

        let value = fetch().await?;
        self.cache.put(category, key, value.clone());
        Ok(value)
    }
}
