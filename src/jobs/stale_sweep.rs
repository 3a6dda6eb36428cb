//! Scheduled stale sweep

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::services::SweepTask;
use crate::sweep::{SweepError, SweepOutcome};

/// Run one sweep for the scheduler.
///
/// An overlapping trigger or an unreadable configuration is logged and
/// treated as a no-op; anything else is returned to the caller.
pub async fn run_sweep(task: Arc<SweepTask>, shutdown: CancellationToken) -> Result<()> {
    match task.execute(&shutdown).await {
        Ok(SweepOutcome::Completed(result)) => {
            info!(
                scanned = result.scanned,
                deleted = result.deleted,
                dry_run = result.dry_run,
                "Scheduled stale sweep finished"
            );
            Ok(())
        }
        Ok(SweepOutcome::Canceled(result)) => {
            warn!(scanned = result.scanned, deleted = result.deleted, "Scheduled stale sweep canceled");
            Ok(())
        }
        Err(SweepError::AlreadyRunning) => {
            warn!("Previous stale sweep still running; skipping this trigger");
            Ok(())
        }
        Err(SweepError::ConfigUnavailable(e)) => {
            error!(error = %e, "Stale Sweep config not available");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
