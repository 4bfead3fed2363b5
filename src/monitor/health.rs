//! Cache audit and repair
//!
//! Classifies every cached roster as healthy, problematic or legitimately
//! empty, and evicts problematic ones so the next request refetches them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheManager, CategoryMap};
use crate::data::{category, student_count, DataQualityValidator, KnownEmptySet};

/// Issues listed in a batch's detail line before summarizing the rest
const DETAIL_LIMIT: usize = 3;

/// Overall classification of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Healthy,
    NeedsAttention,
    Empty,
}

/// Findings for one problematic batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchIssue {
    pub batch: String,
    /// First few findings joined with "; ", with a "(+N more)" suffix
    pub detail: String,
    /// Total number of findings
    pub count: usize,
}

/// Point-in-time health of the cached rosters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub overall_health: OverallHealth,
    /// Every cached roster, whatever its state
    pub total_batches: usize,
    /// Non-empty rosters with no findings
    pub healthy_batches: usize,
    /// Rosters with findings, plus empty rosters not known to be empty
    pub problematic_batches: Vec<String>,
    /// Empty rosters of known-empty batches
    pub empty_batches: Vec<String>,
    /// One entry per problematic batch, in batch order
    pub issues: Vec<BatchIssue>,
    /// When the snapshot was taken
    pub last_validation: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Snapshot of a cache with nothing valid in it
    pub fn empty() -> Self {
        Self::from_entries(&CategoryMap::new(), &KnownEmptySet::default(), &DataQualityValidator)
    }

    /// Classifies every roster in `entries`
    pub fn from_entries(
        entries: &CategoryMap,
        known_empty: &KnownEmptySet,
        validator: &DataQualityValidator,
    ) -> Self {
        let mut healthy_batches = 0;
        let mut problematic_batches = Vec::new();
        let mut empty_batches = Vec::new();
        let mut issues = Vec::new();

        for (batch, payload) in entries {
            if student_count(payload) == 0 {
                if known_empty.contains(batch) {
                    empty_batches.push(batch.clone());
                } else {
                    problematic_batches.push(batch.clone());
                    issues.push(BatchIssue {
                        batch: batch.clone(),
                        detail: "no students cached".to_string(),
                        count: 1,
                    });
                }
                continue;
            }

            let findings = validator.validate_payload(payload, batch);
            if findings.is_empty() {
                healthy_batches += 1;
                continue;
            }

            let mut detail = findings
                .iter()
                .take(DETAIL_LIMIT)
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            if findings.len() > DETAIL_LIMIT {
                detail.push_str(&format!(" (+{} more)", findings.len() - DETAIL_LIMIT));
            }
            problematic_batches.push(batch.clone());
            issues.push(BatchIssue {
                batch: batch.clone(),
                detail,
                count: findings.len(),
            });
        }

        let overall_health = if !problematic_batches.is_empty() {
            OverallHealth::NeedsAttention
        } else if healthy_batches == 0 {
            OverallHealth::Empty
        } else {
            OverallHealth::Healthy
        };

        Self {
            overall_health,
            total_batches: entries.len(),
            healthy_batches,
            problematic_batches,
            empty_batches,
            issues,
            last_validation: Utc::now(),
        }
    }
}

/// Audits the `students` category and evicts problematic batches
#[derive(Debug, Clone)]
pub struct HealthChecker {
    cache: CacheManager,
    known_empty: Arc<KnownEmptySet>,
    validator: DataQualityValidator,
}

impl HealthChecker {
    pub fn new(cache: CacheManager, known_empty: KnownEmptySet) -> Self {
        Self {
            cache,
            known_empty: Arc::new(known_empty),
            validator: DataQualityValidator::new(),
        }
    }

    /// Current health without modifying anything
    pub fn snapshot(&self) -> HealthSnapshot {
        match self.cache.category(category::STUDENTS) {
            Some(entries) => self.assess(&entries),
            None => HealthSnapshot::empty(),
        }
    }

    fn assess(&self, entries: &CategoryMap) -> HealthSnapshot {
        HealthSnapshot::from_entries(entries, &self.known_empty, &self.validator)
    }

    /// One audit pass; `None` when the document is expired and there is nothing to audit
    pub fn check_and_repair(&self) -> Option<HealthSnapshot> {
        let Some(entries) = self.cache.category(category::STUDENTS) else {
            info!("Cache expired or empty; skipping health check");
            return None;
        };
        let snapshot = self.assess(&entries);

        match snapshot.overall_health {
            OverallHealth::NeedsAttention => {
                warn!(batches = ?snapshot.problematic_batches, "Cache health issues detected");
                let cleared = self.repair(&snapshot, &entries);
                if !cleared.is_empty() {
                    warn!(batches = ?cleared, "Cleared problematic batches; they will be refetched on next access");
                }
            }
            OverallHealth::Healthy => info!(
                "Cache health is good: {}/{} batches healthy",
                snapshot.healthy_batches, snapshot.total_batches
            ),
            OverallHealth::Empty => warn!("Cache is empty, will be populated on next request"),
        }

        Some(snapshot)
    }

    /// Evicts every problematic batch that still holds the audited value
    fn repair(&self, snapshot: &HealthSnapshot, audited: &CategoryMap) -> Vec<String> {
        for issue in &snapshot.issues {
            warn!(batch = %issue.batch, count = issue.count, detail = %issue.detail, "Problematic batch");
        }
        snapshot
            .problematic_batches
            .iter()
            .filter(|batch| {
                let expected = audited.get(batch.as_str()).unwrap_or(&Value::Null);
                self.cache
                    .invalidate_if_unchanged(category::STUDENTS, batch, expected)
            })
            .cloned()
            .collect()
    }
}
