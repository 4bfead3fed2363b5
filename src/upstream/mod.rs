//! Upstream data source boundary
//!
//! The cache only needs "fetch category X with parameters Y". Each method
//! returns the `data` object of the upstream response as opaque JSON.

pub mod graphql;

pub use graphql::GraphqlClient;

use async_trait::async_trait;
use serde_json::Value;

pub use crate::error::UpstreamError;

/// Source of truth the cache sits in front of
#[async_trait]
pub trait DataSource: Send + Sync {
    /// `{ "allBatches": [{ "name", "secCount" }] }`
    async fn all_batches(&self) -> Result<Value, UpstreamError>;

    /// `{ "students": [StudentRecord] }`
    async fn students_by_batch(&self, batch: &str) -> Result<Value, UpstreamError>;

    /// `{ "student": StudentRecord | null }`
    async fn student(&self, batch: &str, username: &str) -> Result<Value, UpstreamError>;

    /// `{ "contestStatusLeaderboard": { "participants", "nonParticipants" } }`
    async fn contest_leaderboard(&self, batch: &str, title: &str) -> Result<Value, UpstreamError>;

    /// `{ "allContests": [title] }`
    async fn all_contests(&self, batch: &str) -> Result<Value, UpstreamError>;

    /// `{ "contestDetails": { "title", "questions" } | null }`
    async fn contest_details(&self, title: &str) -> Result<Value, UpstreamError>;
}
