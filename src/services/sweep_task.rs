//! The stale sweep as a schedulable task.
//!
//! Wraps [`SweepService`] with what the scheduler and the HTTP surface need:
//! loading the persisted configuration, a single-flight guard so runs never
//! overlap, cancellation of the active run, and a status snapshot with the
//! latest progress and outcome.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::sweep::{SweepConfig, SweepError, SweepOutcome, SweepService};

pub const TASK_NAME: &str = "Stale Sweep";
pub const TASK_KEY: &str = "StaleSweep";
pub const TASK_CATEGORY: &str = "Library";
pub const TASK_DESCRIPTION: &str =
    "Deletes old + unwatched media from selected libraries (or logs in Dry Run).";

/// Where the task reads its configuration from at the start of each run.
#[async_trait]
pub trait SweepConfigSource: Send + Sync {
    async fn load(&self) -> Result<SweepConfig>;
}

/// Snapshot of the task for status reporting.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub running: bool,
    pub progress: f64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_result: Option<SweepOutcome>,
    pub last_error: Option<String>,
}

pub struct SweepTask {
    service: SweepService,
    config_source: Arc<dyn SweepConfigSource>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    current: Mutex<Option<CancellationToken>>,
    status: Arc<RwLock<TaskStatus>>,
}

impl SweepTask {
    pub fn new(service: SweepService, config_source: Arc<dyn SweepConfigSource>) -> Self {
        Self {
            service,
            config_source,
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            current: Mutex::new(None),
            status: Arc::new(RwLock::new(TaskStatus::default())),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.read().running
    }

    /// Request cancellation of the active run. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) => {
                info!(task = TASK_KEY, "Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run a sweep to completion on the current task.
    ///
    /// Fails with [`SweepError::AlreadyRunning`] instead of waiting when
    /// another run holds the guard.
    pub async fn execute(&self, shutdown: &CancellationToken) -> Result<SweepOutcome, SweepError> {
        let guard = self.acquire()?;
        let cancel = self.begin(shutdown);
        self.run_locked(guard, cancel).await
    }

    /// Start a sweep in the background. The guard is taken before this
    /// returns, so a second call fails immediately.
    pub fn spawn(
        self: &Arc<Self>,
        shutdown: &CancellationToken,
    ) -> Result<JoinHandle<Result<SweepOutcome, SweepError>>, SweepError> {
        let guard = self.acquire()?;
        let cancel = self.begin(shutdown);
        let task = Arc::clone(self);
        Ok(tokio::spawn(async move { task.run_locked(guard, cancel).await }))
    }

    fn acquire(&self) -> Result<OwnedMutexGuard<()>, SweepError> {
        self.run_lock.clone().try_lock_owned().map_err(|_| {
            warn!(task = TASK_KEY, "Sweep already running; not starting another");
            SweepError::AlreadyRunning
        })
    }

    fn begin(&self, shutdown: &CancellationToken) -> CancellationToken {
        let cancel = shutdown.child_token();
        *self.current.lock() = Some(cancel.clone());

        let mut status = self.status.write();
        status.running = true;
        status.progress = 0.0;
        status.last_started_at = Some(Utc::now());
        status.last_error = None;

        cancel
    }

    async fn run_locked(
        &self,
        _guard: OwnedMutexGuard<()>,
        cancel: CancellationToken,
    ) -> Result<SweepOutcome, SweepError> {
        let result = self.run_once(&cancel).await;

        *self.current.lock() = None;
        {
            let mut status = self.status.write();
            status.running = false;
            status.last_finished_at = Some(Utc::now());
            match &result {
                Ok(outcome) => status.last_result = Some(*outcome),
                Err(e) => status.last_error = Some(e.to_string()),
            }
        }

        match &result {
            Ok(SweepOutcome::Canceled(_)) => warn!(task = TASK_KEY, "Stale Sweep canceled"),
            Ok(SweepOutcome::Completed(_)) => {}
            Err(e) => error!(task = TASK_KEY, error = %e, "Stale Sweep failed"),
        }

        result
    }

    async fn run_once(&self, cancel: &CancellationToken) -> Result<SweepOutcome, SweepError> {
        let config = self
            .config_source
            .load()
            .await
            .map_err(SweepError::ConfigUnavailable)?;

        let status = Arc::clone(&self.status);
        let progress = move |percent: f64| {
            status.write().progress = percent;
        };

        self.service.run(&config, &progress, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use anyhow::anyhow;
    use assert_matches::assert_matches;
    use tokio::sync::Notify;
    use uuid::Uuid;

    use crate::db::Database;
    use crate::sweep::LocalFilesystem;

    struct GatedConfig {
        gate: Arc<Notify>,
        config: SweepConfig,
    }

    #[async_trait]
    impl SweepConfigSource for GatedConfig {
        async fn load(&self) -> Result<SweepConfig> {
            self.gate.notified().await;
            Ok(self.config.clone())
        }
    }

    struct BrokenConfig;

    #[async_trait]
    impl SweepConfigSource for BrokenConfig {
        async fn load(&self) -> Result<SweepConfig> {
            Err(anyhow!("settings table missing"))
        }
    }

    async fn task_with(source: Arc<dyn SweepConfigSource>) -> Arc<SweepTask> {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let service = SweepService::new(db.clone(), db.clone(), db, Arc::new(LocalFilesystem));
        Arc::new(SweepTask::new(service, source))
    }

    #[tokio::test]
    async fn test_empty_selection_completes_with_full_progress() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let service = SweepService::new(db.clone(), db.clone(), db.clone(), Arc::new(LocalFilesystem));
        let task = SweepTask::new(service, db);

        let outcome = task.execute(&CancellationToken::new()).await.unwrap();
        assert_matches!(outcome, SweepOutcome::Completed(r) if r.scanned == 0 && r.deleted == 0);

        let status = task.status();
        assert!(!status.running);
        assert_eq!(status.progress, 100.0);
        assert_eq!(status.last_result, Some(outcome));
        assert!(status.last_finished_at.is_some());
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_rejected() {
        let gate = Arc::new(Notify::new());
        let task = task_with(Arc::new(GatedConfig {
            gate: gate.clone(),
            config: SweepConfig::default(),
        }))
        .await;
        let shutdown = CancellationToken::new();

        let first = task.spawn(&shutdown).unwrap();
        assert!(task.is_running());
        assert_matches!(task.execute(&shutdown).await, Err(SweepError::AlreadyRunning));
        assert_matches!(task.spawn(&shutdown), Err(SweepError::AlreadyRunning));

        gate.notify_one();
        assert_matches!(first.await.unwrap(), Ok(SweepOutcome::Completed(_)));
        assert!(!task.is_running());

        // The guard is released once the run finishes.
        gate.notify_one();
        assert_matches!(task.execute(&shutdown).await, Ok(SweepOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_cancel_stops_active_run() {
        let gate = Arc::new(Notify::new());
        let task = task_with(Arc::new(GatedConfig {
            gate: gate.clone(),
            config: SweepConfig {
                library_ids: vec![Uuid::new_v4()],
                ..Default::default()
            },
        }))
        .await;

        assert!(!task.cancel());
        let handle = task.spawn(&CancellationToken::new()).unwrap();
        assert!(task.cancel());
        gate.notify_one();

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.is_canceled());
        assert_eq!(outcome.result().scanned, 0);
        assert!(!task.cancel());
    }

    #[tokio::test]
    async fn test_shutdown_token_cancels_run() {
        let gate = Arc::new(Notify::new());
        let task = task_with(Arc::new(GatedConfig {
            gate: gate.clone(),
            config: SweepConfig {
                library_ids: vec![Uuid::new_v4()],
                ..Default::default()
            },
        }))
        .await;
        let shutdown = CancellationToken::new();

        let handle = task.spawn(&shutdown).unwrap();
        shutdown.cancel();
        gate.notify_one();

        assert!(handle.await.unwrap().unwrap().is_canceled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_readers_never_block_a_new_run() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let task = task_with(db).await;
        let done = CancellationToken::new();

        let reader = {
            let task = Arc::clone(&task);
            let done = done.clone();
            tokio::spawn(async move {
                while !done.is_cancelled() {
                    let _ = task.is_running();
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..50 {
            let handle = task.spawn(&CancellationToken::new()).unwrap();
            assert_matches!(handle.await.unwrap(), Ok(SweepOutcome::Completed(_)));
        }

        done.cancel();
        reader.await.unwrap();
        assert_eq!(task.is_running(), task.status().running);
    }

    #[tokio::test]
    async fn test_unreadable_config_is_reported() {
        let task = task_with(Arc::new(BrokenConfig)).await;

        let result = task.execute(&CancellationToken::new()).await;
        assert_matches!(result, Err(SweepError::ConfigUnavailable(_)));

        let status = task.status();
        assert!(!status.running);
        assert!(status.last_error.unwrap().contains("settings table missing"));
    }
}
