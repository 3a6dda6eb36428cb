//! Sweep orchestration
//!
//! Drives one pass over the configured libraries. Processing is strictly
//! sequential: libraries in configured order, items in catalog order, one
//! deletion at a time. Cancellation is checked before each library and each
//! item and ends the run with [`SweepOutcome::Canceled`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::executor::{DeleteExecutor, Filesystem};
use super::model::{
    ItemKind, ItemQuery, MediaItem, SweepConfig, SweepOutcome, SweepResult, TvDeleteMode,
};
use super::policy::{UnplayedOracle, WatchStateOracle, is_stale_leaf, should_delete_season};
use super::{Catalog, ProgressSink, UserDirectory, WatchStateStore};

/// Progress is reported once per this many scanned items.
pub const PROGRESS_INTERVAL: u64 = 250;

/// Errors that end a sweep without a result.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to enumerate items in library {library_id}: {source}")]
    Enumeration {
        library_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load the user list: {0}")]
    Users(#[source] anyhow::Error),

    #[error("sweep configuration unavailable: {0}")]
    ConfigUnavailable(#[source] anyhow::Error),

    #[error("a sweep is already running")]
    AlreadyRunning,
}

/// Runs retention sweeps against a catalog.
pub struct SweepService {
    catalog: Arc<dyn Catalog>,
    watch_states: Arc<dyn WatchStateStore>,
    users: Arc<dyn UserDirectory>,
    executor: DeleteExecutor<Arc<dyn Filesystem>>,
}

/// Mutable state of a single run.
struct RunState<'a> {
    config: &'a SweepConfig,
    age_limit_days: i64,
    cutoff: DateTime<Utc>,
    oracle: WatchStateOracle,
    progress: &'a dyn ProgressSink,
    result: SweepResult,
}

impl SweepService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        watch_states: Arc<dyn WatchStateStore>,
        users: Arc<dyn UserDirectory>,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        Self {
            catalog,
            watch_states,
            users,
            executor: DeleteExecutor::new(fs),
        }
    }

    /// Run a sweep using the current time for the cutoff.
    pub async fn run(
        &self,
        config: &SweepConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<SweepOutcome, SweepError> {
        self.run_at(config, Utc::now(), progress, cancel).await
    }

    /// Run a sweep with an explicit "now". The cutoff is derived once and
    /// held for the whole run.
    pub async fn run_at(
        &self,
        config: &SweepConfig,
        now: DateTime<Utc>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<SweepOutcome, SweepError> {
        let library_ids = config.distinct_library_ids();
        if library_ids.is_empty() {
            info!("No libraries selected; nothing to do");
            progress.report(100.0);
            return Ok(SweepOutcome::Completed(SweepResult {
                dry_run: config.dry_run,
                ..Default::default()
            }));
        }

        let age_limit_days = config.effective_age_limit_days();
        let cutoff = config.cutoff(now);

        info!(
            libraries = library_ids.len(),
            age_limit_days,
            dry_run = config.dry_run,
            tv_mode = ?config.tv_mode,
            cutoff = %cutoff,
            "Stale sweep starting"
        );

        let users = self.users.list_users().await.map_err(SweepError::Users)?;
        debug!(users = users.len(), "User list snapshot taken");

        let mut state = RunState {
            config,
            age_limit_days,
            cutoff,
            oracle: WatchStateOracle::new(users, self.watch_states.clone()),
            progress,
            result: SweepResult {
                dry_run: config.dry_run,
                ..Default::default()
            },
        };

        for library_id in library_ids {
            if cancel.is_cancelled() {
                return Ok(Self::canceled(state.result));
            }

            let library = match self.catalog.resolve_library(library_id).await {
                Ok(Some(library)) => library,
                Ok(None) => {
                    warn!(library_id = %library_id, "Library not found; skipping");
                    continue;
                }
                Err(e) => {
                    warn!(library_id = %library_id, error = %e, "Failed to resolve library; skipping");
                    continue;
                }
            };

            info!(library_id = %library.id, library_name = %library.name, "Scanning library");

            let candidates = self
                .catalog
                .list_items(&ItemQuery::sweep_candidates(library.id))
                .await
                .map_err(|source| {
                    error!(library_id = %library.id, error = %source, "Failed to enumerate library items");
                    SweepError::Enumeration {
                        library_id: library.id,
                        source,
                    }
                })?;

            for item in &candidates {
                if cancel.is_cancelled() {
                    return Ok(Self::canceled(state.result));
                }
                state.result.scanned += 1;

                let affected = self.process_item(&state, item).await;
                state.result.deleted += affected;

                if state.result.scanned % PROGRESS_INTERVAL == 0 {
                    let percent = (state.result.scanned as f64 / PROGRESS_INTERVAL as f64).min(99.0);
                    state.progress.report(percent);
                }
            }
        }

        if !config.dry_run && state.result.deleted > 0 {
            info!("Deletions complete; queueing a library scan");
            if let Err(e) = self.catalog.queue_rescan().await {
                error!(error = %e, "Failed to queue library scan");
            }
        }

        info!(
            scanned = state.result.scanned,
            deleted = state.result.deleted,
            dry_run = state.result.dry_run,
            "Stale sweep finished"
        );
        progress.report(100.0);

        Ok(SweepOutcome::Completed(state.result))
    }

    /// Decide on one candidate and delete it if stale. Returns paths affected.
    async fn process_item(&self, state: &RunState<'_>, item: &MediaItem) -> u64 {
        match item.kind {
            ItemKind::Movie | ItemKind::Episode => {
                if !is_stale_leaf(item, state.cutoff, &state.oracle).await {
                    return 0;
                }
                let reason = format!("Unwatched for {} days", state.age_limit_days);
                self.executor
                    .try_delete(item, state.config.dry_run, &reason)
                    .await
                    .paths_affected()
            }
            ItemKind::Season => {
                if !self.season_is_stale(state, item, &state.oracle).await {
                    return 0;
                }
                let reason = format!(
                    "Season has unwatched episodes older than {} days",
                    state.age_limit_days
                );
                self.executor
                    .try_delete(item, state.config.dry_run, &reason)
                    .await
                    .paths_affected()
            }
        }
    }

    async fn season_is_stale(
        &self,
        state: &RunState<'_>,
        season: &MediaItem,
        oracle: &dyn UnplayedOracle,
    ) -> bool {
        if state.config.tv_mode != TvDeleteMode::DeleteSeasonIfAnyUnwatched {
            return false;
        }

        if !season.created_before(state.cutoff) {
            return false;
        }

        let episodes = match self
            .catalog
            .list_items(&ItemQuery::season_episodes(season.id))
            .await
        {
            Ok(episodes) => episodes,
            Err(e) => {
                warn!(season_id = %season.id, error = %e, "Failed to list season episodes; keeping season");
                return false;
            }
        };

        should_delete_season(season, &episodes, state.cutoff, oracle, state.config.tv_mode).await
    }

    fn canceled(result: SweepResult) -> SweepOutcome {
        warn!(
            scanned = result.scanned,
            deleted = result.deleted,
            "Stale sweep canceled"
        );
        SweepOutcome::Canceled(result)
    }
}
