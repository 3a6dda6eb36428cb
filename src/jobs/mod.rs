//! Background job scheduling and workers

pub mod stale_sweep;

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::services::SweepTask;

/// Initialize and start the job scheduler
pub async fn start_scheduler(
    sweep_task: Arc<SweepTask>,
    sweep_schedule: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Stale sweep - daily by default
    let sweep_job = Job::new_async(sweep_schedule, move |_uuid, _l| {
        let task = sweep_task.clone();
        let shutdown = shutdown.clone();
        Box::pin(async move {
            info!("Running stale sweep");
            if let Err(e) = stale_sweep::run_sweep(task, shutdown).await {
                tracing::error!("Stale sweep error: {}", e);
            }
        })
    })?;
    scheduler.add(sweep_job).await?;

    scheduler.start().await?;

    info!(schedule = sweep_schedule, "Job scheduler started");
    Ok(scheduler)
}
