//! Command-line interface for cache administration
//!
//! Commands print human-readable text and always exit successfully; failures
//! are reported in the output rather than through the exit code.

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::cache::CacheInfo;
use crate::data::{student_count, STUDENTS_FIELD};
use crate::error::UpstreamError;
use crate::monitor::{HealthSnapshot, OverallHealth};
use crate::service::StudentDataService;

/// Rosterwatch - inspect and repair the student roster cache
#[derive(Parser, Debug)]
#[command(name = "rosterwatch")]
#[command(about = "Inspect, repair and monitor the student roster cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show cache information
    Info,
    /// Clear cache for a specific batch
    ClearBatch {
        /// Batch name, e.g. batch24-28
        batch: Option<String>,
    },
    /// Clear all cache
    ClearAll,
    /// Fetch a batch straight from the backend, bypassing the cache
    TestBatch {
        /// Batch name, e.g. batch24-28
        batch: Option<String>,
    },
    /// Show cache health
    Health,
    /// Run the health monitor in the foreground until Ctrl-C
    Monitor {
        /// Seconds between checks (defaults to CACHE_CHECK_INTERVAL_SECS or one hour)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

const MISSING_BATCH: &str = "Error: Please specify batch name";

/// Runs a one-shot command and returns the text to print
///
/// `Monitor` is long-running and handled by the binary; here it only
/// reports that it needs the foreground loop.
pub async fn execute(command: &Command, service: &StudentDataService) -> String {
    match command {
        Command::Info => render_info(&service.get_cache_info()),
        Command::ClearBatch { batch: None } | Command::TestBatch { batch: None } => {
            MISSING_BATCH.to_string()
        }
        Command::ClearBatch { batch: Some(batch) } => {
            if service.clear_cache_for_batch(batch) {
                format!("Cleared cache for batch '{}'", batch)
            } else {
                format!("No cached data for batch '{}'", batch)
            }
        }
        Command::ClearAll => {
            service.clear_all_cache();
            "Cleared all cache".to_string()
        }
        Command::TestBatch { batch: Some(batch) } => {
            render_test_batch(batch, service.fetch_fresh_batch(batch).await)
        }
        Command::Health => render_health(&service.get_cache_health_status()),
        Command::Monitor { .. } => "Error: monitor must run in the foreground".to_string(),
    }
}

/// Formats `describe()` output
pub fn render_info(info: &CacheInfo) -> String {
    let mut out = String::from("=== Cache Information ===\n");
    out.push_str(&format!("Cache file: {}\n", info.cache_file));
    out.push_str(&format!("Cache exists: {}\n", info.cache_exists));
    out.push_str(&format!(
        "Last fetch: {}\n",
        info.last_fetch_time.as_deref().unwrap_or("never")
    ));
    out.push_str(&format!("Cache valid: {}\n", info.is_valid));
    out.push_str("\nCached batches:\n");
    if info.cached_batches.is_empty() {
        out.push_str("  (none)\n");
    }
    for batch in &info.cached_batches {
        let status = if batch.student_count > 0 { "✅" } else { "⚠️" };
        out.push_str(&format!(
            "  {} {}: {} students\n",
            status, batch.batch, batch.student_count
        ));
    }
    out
}

/// Formats a health snapshot
pub fn render_health(snapshot: &HealthSnapshot) -> String {
    let overall = match snapshot.overall_health {
        OverallHealth::Healthy => "healthy",
        OverallHealth::NeedsAttention => "needs attention",
        OverallHealth::Empty => "empty",
    };
    let mut out = String::from("=== Cache Health ===\n");
    out.push_str(&format!("Overall: {}\n", overall));
    out.push_str(&format!(
        "Healthy batches: {}/{}\n",
        snapshot.healthy_batches, snapshot.total_batches
    ));
    if !snapshot.empty_batches.is_empty() {
        out.push_str(&format!("Known-empty batches: {}\n", snapshot.empty_batches.join(", ")));
    }
    for issue in &snapshot.issues {
        out.push_str(&format!(
            "  ⚠️ {} ({} issues): {}\n",
            issue.batch, issue.count, issue.detail
        ));
    }
    out.push_str(&format!("Last validation: {}\n", snapshot.last_validation.to_rfc3339()));
    out
}

/// Formats the result of a cache-bypassing roster fetch
pub fn render_test_batch(batch: &str, result: Result<Value, UpstreamError>) -> String {
    let mut out = format!("=== Testing fresh query for {} ===\n", batch);
    match result {
        Ok(roster) => {
            let count = student_count(&roster);
            out.push_str(&format!("Result: {} students\n", count));
            if count > 0 {
                let name = roster[STUDENTS_FIELD][0]
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("N/A");
                out.push_str(&format!("First student: {}\n", name));
            }
        }
        Err(e) => out.push_str(&format!("Error: {}\n", e)),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BatchCount, TtlScope};
    use crate::monitor::BatchIssue;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_cli_parse_info() {
        let cli = Cli::parse_from(["rosterwatch", "info"]);
        assert_eq!(cli.command, Command::Info);
    }

    #[test]
    fn test_cli_parse_clear_batch_with_and_without_name() {
        let cli = Cli::parse_from(["rosterwatch", "clear-batch", "batch24-28"]);
        assert_eq!(
            cli.command,
            Command::ClearBatch { batch: Some("batch24-28".into()) }
        );

        let cli = Cli::parse_from(["rosterwatch", "clear-batch"]);
        assert_eq!(cli.command, Command::ClearBatch { batch: None });
    }

    #[test]
    fn test_cli_parse_monitor_interval() {
        let cli = Cli::parse_from(["rosterwatch", "monitor", "--interval", "120"]);
        assert_eq!(cli.command, Command::Monitor { interval: Some(120) });
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["rosterwatch", "explode"]).is_err());
        assert!(Cli::try_parse_from(["rosterwatch"]).is_err());
    }

    #[test]
    fn test_render_info_marks_empty_batches() {
        let info = CacheInfo {
            cache_file: "student_cache.json".into(),
            cache_exists: true,
            last_fetch_time: Some("2025-05-01T09:00:00+00:00".into()),
            is_valid: true,
            ttl_hours: 24,
            ttl_scope: TtlScope::Global,
            cached_batches: vec![
                BatchCount { batch: "batch24-28".into(), student_count: 120 },
                BatchCount { batch: "batch23-27".into(), student_count: 0 },
            ],
        };

        let out = render_info(&info);

        assert!(out.contains("Cache file: student_cache.json"));
        assert!(out.contains("Last fetch: 2025-05-01T09:00:00+00:00"));
        assert!(out.contains("✅ batch24-28: 120 students"));
        assert!(out.contains("⚠️ batch23-27: 0 students"));
    }

    #[test]
    fn test_render_info_without_file() {
        let info = CacheInfo {
            cache_file: "x.json".into(),
            cache_exists: false,
            last_fetch_time: None,
            is_valid: false,
            ttl_hours: 24,
            ttl_scope: TtlScope::Global,
            cached_batches: vec![],
        };

        let out = render_info(&info);

        assert!(out.contains("Cache exists: false"));
        assert!(out.contains("Last fetch: never"));
        assert!(out.contains("(none)"));
    }

    #[test]
    fn test_render_health_lists_issues() {
        let snapshot = HealthSnapshot {
            overall_health: OverallHealth::NeedsAttention,
            total_batches: 2,
            healthy_batches: 1,
            problematic_batches: vec!["b2".into()],
            empty_batches: vec![],
            issues: vec![BatchIssue {
                batch: "b2".into(),
                detail: "asha: rating out of range (observed 5000)".into(),
                count: 1,
            }],
            last_validation: Utc::now(),
        };

        let out = render_health(&snapshot);

        assert!(out.contains("Overall: needs attention"));
        assert!(out.contains("Healthy batches: 1/2"));
        assert!(out.contains("b2 (1 issues): asha: rating out of range"));
    }

    #[test]
    fn test_render_test_batch_variants() {
        let ok = render_test_batch("b1", Ok(json!({"students": [{"name": "Asha"}, {"name": "Ravi"}]})));
        assert!(ok.contains("Result: 2 students"));
        assert!(ok.contains("First student: Asha"));

        let empty = render_test_batch("b1", Ok(json!({"students": []})));
        assert!(empty.contains("Result: 0 students"));
        assert!(!empty.contains("First student"));

        let failed = render_test_batch("b1", Err(UpstreamError::Transport("refused".into())));
        assert!(failed.contains("Error: upstream transport failed: refused"));
    }
}
