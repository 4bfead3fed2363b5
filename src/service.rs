//! Operations exposed to the tool-dispatch layer and to admin tooling
//!
//! Every read goes through the fetch-through path. Rosters use the
//! self-healing record-set path; everything else is a single cached document.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheInfo, CacheManager};
use crate::data::{category, student_count, KnownEmptySet, STUDENTS_FIELD};
use crate::error::{FetchError, UpstreamError};
use crate::fetch::{FetchOrchestrator, RetryPolicy};
use crate::monitor::{HealthChecker, HealthSnapshot};
use crate::upstream::DataSource;

const ALL_BATCHES_KEY: &str = "all";

/// Cached access to the upstream student/contest data
#[derive(Clone)]
pub struct StudentDataService {
    source: Arc<dyn DataSource>,
    orchestrator: FetchOrchestrator,
    checker: HealthChecker,
}

impl StudentDataService {
    pub fn new(
        source: Arc<dyn DataSource>,
        cache: CacheManager,
        known_empty: KnownEmptySet,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            checker: HealthChecker::new(cache.clone(), known_empty.clone()),
            orchestrator: FetchOrchestrator::new(cache, known_empty, retry),
        }
    }

    pub fn cache(&self) -> &CacheManager {
        self.orchestrator.cache()
    }

    /// Health checker sharing this service's cache, for the background monitor
    pub fn health_checker(&self) -> HealthChecker {
        self.checker.clone()
    }

    pub async fn get_all_batches(&self) -> Result<Value, FetchError> {
        self.orchestrator
            .fetch_value(category::BATCHES, ALL_BATCHES_KEY, || self.source.all_batches())
            .await
    }

    pub async fn get_students_by_batch(&self, batch: &str) -> Result<Value, FetchError> {
        self.orchestrator
            .fetch_record_set(category::STUDENTS, batch, STUDENTS_FIELD, || {
                self.source.students_by_batch(batch)
            })
            .await
    }

    /// Looks the student up in the cached roster, else asks the upstream directly
    pub async fn get_student(&self, batch: &str, username: &str) -> Result<Value, FetchError> {
        if let Some(roster) = self.cache().get(category::STUDENTS, batch) {
            let found = roster
                .get(STUDENTS_FIELD)
                .and_then(Value::as_array)
                .and_then(|students| {
                    students
                        .iter()
                        .find(|s| s.get("leetcodeUsername").and_then(Value::as_str) == Some(username))
                });
            if let Some(student) = found {
                debug!(batch, username, "Student served from cached roster");
                return Ok(json!({ "student": student }));
            }
        }

        Ok(self.source.student(batch, username).await?)
    }

    pub async fn get_contest_leaderboard(&self, batch: &str, title: &str) -> Result<Value, FetchError> {
        let key = format!("{}:{}", batch, title);
        self.orchestrator
            .fetch_value(category::LEADERBOARDS, &key, || {
                self.source.contest_leaderboard(batch, title)
            })
            .await
    }

    pub async fn get_all_contests(&self, batch: &str) -> Result<Value, FetchError> {
        self.orchestrator
            .fetch_value(category::CONTESTS, batch, || self.source.all_contests(batch))
            .await
    }

    pub async fn get_contest_details(&self, title: &str) -> Result<Value, FetchError> {
        self.orchestrator
            .fetch_value(category::CONTEST_DETAILS, title, || self.source.contest_details(title))
            .await
    }

    /// Bypasses the cache entirely and returns the upstream roster size
    pub async fn fetch_fresh_batch(&self, batch: &str) -> Result<Value, UpstreamError> {
        let roster = self.source.students_by_batch(batch).await?;
        info!(batch, students = student_count(&roster), "Fetched fresh roster");
        Ok(roster)
    }

    pub fn clear_cache_for_batch(&self, batch: &str) -> bool {
        self.cache().invalidate(category::STUDENTS, batch)
    }

    pub fn clear_all_cache(&self) {
        self.cache().invalidate_all();
    }

    pub fn get_cache_info(&self) -> CacheInfo {
        self.cache().describe()
    }

    pub fn get_cache_health_status(&self) -> HealthSnapshot {
        self.checker.snapshot()
    }
}
