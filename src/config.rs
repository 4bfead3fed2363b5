//! Runtime configuration read from environment variables

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::ttl_from_hours;
use crate::data::KnownEmptySet;
use crate::error::ConfigError;
use crate::fetch::RetryPolicy;
use crate::upstream::graphql::DEFAULT_ENDPOINT;

/// Default cache file, relative to the working directory
pub const DEFAULT_CACHE_FILE: &str = "student_cache.json";

/// Monitor interval when running inside the service (4 hours)
pub const SERVICE_CHECK_INTERVAL: Duration = Duration::from_secs(4 * 3600);

/// Monitor interval when running standalone from the CLI (1 hour)
pub const STANDALONE_CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// GraphQL endpoint (`BACKEND_API_URL`)
    pub backend_url: String,
    /// Cache document location (`CACHE_FILE`)
    pub cache_file: PathBuf,
    /// Document-wide TTL (`CACHE_TTL_HOURS`)
    pub cache_ttl_hours: u64,
    /// Explicit `CACHE_CHECK_INTERVAL_SECS`, if set
    pub check_interval: Option<Duration>,
    /// Batches whose empty roster is expected (`KNOWN_EMPTY_BATCHES`, comma-separated)
    pub known_empty_batches: Vec<String>,
    /// Per-request timeout (`UPSTREAM_TIMEOUT_SECS`)
    pub upstream_timeout: Duration,
    /// Record-set retry policy (`FETCH_MAX_RETRIES`, `FETCH_RETRY_BACKOFF_SECS`)
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_ENDPOINT.to_string(),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            cache_ttl_hours: 24,
            check_interval: None,
            known_empty_batches: Vec::new(),
            upstream_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Parses configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Parses configuration from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let backend_url = get("BACKEND_API_URL")
            .map(str::to_string)
            .unwrap_or(defaults.backend_url);

        let cache_file = get("CACHE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_file);

        let cache_ttl_hours =
            parse_var("CACHE_TTL_HOURS", get("CACHE_TTL_HOURS"))?.unwrap_or(defaults.cache_ttl_hours);
        if ttl_from_hours(cache_ttl_hours).is_none() {
            return Err(ConfigError::InvalidValue {
                name: "CACHE_TTL_HOURS",
                value: cache_ttl_hours.to_string(),
            });
        }

        let check_interval = parse_var::<u64>("CACHE_CHECK_INTERVAL_SECS", get("CACHE_CHECK_INTERVAL_SECS"))?
            .map(Duration::from_secs);

        let known_empty_batches = get("KNOWN_EMPTY_BATCHES")
            .map(|s| {
                s.split(',')
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let upstream_timeout = parse_var::<u64>("UPSTREAM_TIMEOUT_SECS", get("UPSTREAM_TIMEOUT_SECS"))?
            .map(Duration::from_secs)
            .unwrap_or(defaults.upstream_timeout);

        let retry = RetryPolicy {
            max_retries: parse_var("FETCH_MAX_RETRIES", get("FETCH_MAX_RETRIES"))?
                .unwrap_or(defaults.retry.max_retries),
            backoff: parse_var::<u64>("FETCH_RETRY_BACKOFF_SECS", get("FETCH_RETRY_BACKOFF_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.backoff),
        };

        Ok(Self {
            backend_url,
            cache_file,
            cache_ttl_hours,
            check_interval,
            known_empty_batches,
            upstream_timeout,
            retry,
        })
    }

    pub fn known_empty(&self) -> KnownEmptySet {
        KnownEmptySet::new(self.known_empty_batches.iter().cloned())
    }

    /// Monitor interval for the long-running service
    pub fn service_check_interval(&self) -> Duration {
        self.check_interval.unwrap_or(SERVICE_CHECK_INTERVAL)
    }

    /// Monitor interval for the standalone `monitor` command
    pub fn standalone_check_interval(&self) -> Duration {
        self.check_interval.unwrap_or(STANDALONE_CHECK_INTERVAL)
    }
}

fn parse_var<T: FromStr>(name: &'static str, raw: Option<&str>) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value.parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
    })
    .transpose()
}
