//! Background cache health monitor
//!
//! Runs one audit immediately on start and then once per interval. Each audit
//! runs on the blocking pool; a failed audit is logged and retried after a
//! short back-off instead of ending the monitor. `stop` interrupts the sleep
//! through a shutdown channel and waits for the task to finish.

pub mod health;

pub use health::{BatchIssue, HealthChecker, HealthSnapshot, OverallHealth};

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Wait after a failed audit before resuming the normal schedule
pub const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Externally visible monitor state
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub check_interval_secs: Option<u64>,
    pub last_snapshot: Option<HealthSnapshot>,
}

struct RunningMonitor {
    interval: Duration,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

/// One audit-and-repair pass; `None` when there was nothing to audit
type AuditFn = Arc<dyn Fn() -> Option<HealthSnapshot> + Send + Sync>;

/// Owns the lifecycle of the background audit task
pub struct HealthMonitor {
    audit: AuditFn,
    error_backoff: Duration,
    running: Mutex<Option<RunningMonitor>>,
    last_snapshot: Arc<Mutex<Option<HealthSnapshot>>>,
}

impl HealthMonitor {
    pub fn new(checker: HealthChecker) -> Self {
        Self::with_audit(Arc::new(move || checker.check_and_repair()))
    }

    fn with_audit(audit: AuditFn) -> Self {
        Self {
            audit,
            error_backoff: ERROR_BACKOFF,
            running: Mutex::new(None),
            last_snapshot: Arc::new(Mutex::new(None)),
        }
    }

    /// Overrides the back-off used after a failed audit
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningMonitor>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawns the audit loop on the current Tokio runtime
    ///
    /// The first audit runs immediately. Later audits run every `interval`,
    /// or after the error back-off when an audit fails.
    ///
    /// # Arguments
    /// * `interval` - Delay between the end of one audit and the start of the next
    ///
    /// # Returns
    /// * `true` if the loop was started
    /// * `false` without side effects if the monitor is already running
    pub fn start(&self, interval: Duration) -> bool {
        let mut running = self.running();
        if running.is_some() {
            info!("Cache monitor is already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.audit),
            interval,
            self.error_backoff,
            Arc::clone(&self.last_snapshot),
            shutdown_rx,
        ));

        *running = Some(RunningMonitor {
            interval,
            shutdown_tx,
            task,
        });
        info!(interval_secs = interval.as_secs(), "Cache health monitor started");
        true
    }

    /// Signals the loop to exit and waits for it; no-op when stopped
    pub async fn stop(&self) {
        let Some(monitor) = self.running().take() else {
            return;
        };

        let _ = monitor.shutdown_tx.send(()).await;
        if let Err(e) = monitor.task.await {
            error!(error = %e, "Cache monitor task ended abnormally");
        }
        info!("Cache health monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    pub fn status(&self) -> MonitorStatus {
        let check_interval_secs = self.running().as_ref().map(|m| m.interval.as_secs());
        MonitorStatus {
            running: check_interval_secs.is_some(),
            check_interval_secs,
            last_snapshot: lock(&self.last_snapshot).clone(),
        }
    }

    /// Runs a single audit-and-repair pass outside the schedule
    pub async fn run_once(&self) -> Option<HealthSnapshot> {
        match audit(&self.audit, &self.last_snapshot).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Cache health check failed");
                None
            }
        }
    }
}

fn lock(slot: &Mutex<Option<HealthSnapshot>>) -> MutexGuard<'_, Option<HealthSnapshot>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

async fn audit(
    audit_fn: &AuditFn,
    last_snapshot: &Mutex<Option<HealthSnapshot>>,
) -> Result<Option<HealthSnapshot>, tokio::task::JoinError> {
    let audit_fn = Arc::clone(audit_fn);
    let snapshot = tokio::task::spawn_blocking(move || audit_fn()).await?;
    if let Some(ref snapshot) = snapshot {
        *lock(last_snapshot) = Some(snapshot.clone());
    }
    Ok(snapshot)
}

async fn run_loop(
    audit_fn: AuditFn,
    interval: Duration,
    error_backoff: Duration,
    last_snapshot: Arc<Mutex<Option<HealthSnapshot>>>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        let delay = match audit(&audit_fn, &last_snapshot).await {
            Ok(_) => interval,
            Err(e) => {
                error!(error = %e, "Cache monitor error");
                error_backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::data::KnownEmptySet;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_monitor() -> (HealthMonitor, CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheManager::new(temp_dir.path().join("cache.json"), 24);
        let checker = HealthChecker::new(cache.clone(), KnownEmptySet::default());
        (HealthMonitor::new(checker), cache, temp_dir)
    }

    async fn wait_for_snapshot(monitor: &HealthMonitor) -> HealthSnapshot {
        for _ in 0..200 {
            if let Some(snapshot) = monitor.status().last_snapshot {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("monitor never produced a snapshot");
    }

    #[tokio::test]
    async fn test_start_runs_first_check_immediately() {
        let (monitor, cache, _temp_dir) = create_monitor();
        cache.put("students", "bad", json!({"students": []}));

        assert!(monitor.start(Duration::from_secs(3600)));
        let snapshot = wait_for_snapshot(&monitor).await;

        assert_eq!(snapshot.overall_health, OverallHealth::NeedsAttention);
        assert!(cache.get("students", "bad").is_none());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (monitor, _cache, _temp_dir) = create_monitor();

        assert!(monitor.start(Duration::from_secs(3600)));
        assert!(!monitor.start(Duration::from_secs(60)));
        assert_eq!(monitor.status().check_interval_secs, Some(3600));

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_sleep() {
        let (monitor, _cache, _temp_dir) = create_monitor();
        monitor.start(Duration::from_secs(24 * 3600));
        assert!(monitor.is_running());

        tokio::time::timeout(Duration::from_secs(5), monitor.stop())
            .await
            .expect("stop should not wait out the interval");

        assert!(!monitor.is_running());
        assert!(!monitor.status().running);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let (monitor, _cache, _temp_dir) = create_monitor();
        monitor.stop().await;
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_monitor_can_restart_after_stop() {
        let (monitor, _cache, _temp_dir) = create_monitor();
        assert!(monitor.start(Duration::from_secs(3600)));
        monitor.stop().await;
        assert!(monitor.start(Duration::from_secs(3600)));
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_failed_tick_backs_off_and_resumes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let monitor = HealthMonitor::with_audit(Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("audit failed");
            }
            Some(HealthSnapshot::empty())
        }))
        .with_error_backoff(Duration::from_millis(10));

        assert!(monitor.start(Duration::from_secs(3600)));
        let snapshot = wait_for_snapshot(&monitor).await;

        assert_eq!(snapshot.overall_health, OverallHealth::Empty);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(monitor.is_running());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_run_once_reports_failed_audit_as_none() {
        let monitor = HealthMonitor::with_audit(Arc::new(|| -> Option<HealthSnapshot> { panic!("audit failed") }));

        assert!(monitor.run_once().await.is_none());
        assert!(monitor.status().last_snapshot.is_none());
    }

    #[tokio::test]
    async fn test_run_once_records_snapshot() {
        let (monitor, cache, _temp_dir) = create_monitor();
        cache.put(
            "students",
            "b1",
            json!({"students": [{
                "leetcodeUsername": "a", "name": "A", "section": "S", "rollNumber": "1",
                "totalSolved": 0, "easySolved": 0, "mediumSolved": 0, "hardSolved": 0
            }]}),
        );

        let snapshot = monitor.run_once().await.expect("valid document");

        assert_eq!(snapshot.overall_health, OverallHealth::Healthy);
        assert_eq!(monitor.status().last_snapshot, Some(snapshot));
        assert!(!monitor.status().running);
    }
}
