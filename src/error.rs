//! Error types shared across the crate
//!
//! Persistence failures never leave the cache module; upstream failures are
//! classified so the fetch-through path can decide whether to retry.

use thiserror::Error;

/// Failures reading or writing the cache document
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem read, write or rename failed
    #[error("cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Document on disk is not valid JSON for the expected layout
    #[error("cache file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors returned by the upstream data source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Timeout, refused connection or a retryable HTTP status
    #[error("upstream transport failed: {0}")]
    Transport(String),

    /// Well-formed error reported by the data source itself
    #[error("upstream reported an error: {0}")]
    Protocol(String),

    /// Response body could not be decoded
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Only transport failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transport(_))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return UpstreamError::Decode(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                UpstreamError::Transport(err.to_string())
            }
            Some(_) => UpstreamError::Protocol(err.to_string()),
            None => UpstreamError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::Decode(err.to_string())
    }
}

/// Error surfaced by fetch-through operations when no fallback value exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Invalid environment configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}
