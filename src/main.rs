//! Stale Sweep server
//!
//! Serves the admin REST API and runs the sweep on its cron schedule.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stale_sweep::config::Config;
use stale_sweep::db::Database;
use stale_sweep::jobs;
use stale_sweep::services::{SweepTask, sweep_task};
use stale_sweep::sweep::{LocalFilesystem, SweepService};
use stale_sweep::{AppState, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stale_sweep=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Stale Sweep");

    let db = Database::connect(&config.database_path).await?;
    tracing::info!(path = %config.database_path, "Database connected");

    let host = Arc::new(db.clone());
    let service = SweepService::new(
        host.clone(),
        host.clone(),
        host.clone(),
        Arc::new(LocalFilesystem),
    );
    let sweep_task = Arc::new(SweepTask::new(service, host));
    tracing::info!(
        task = sweep_task::TASK_NAME,
        key = sweep_task::TASK_KEY,
        category = sweep_task::TASK_CATEGORY,
        "Sweep task registered"
    );

    let shutdown = CancellationToken::new();

    let mut scheduler =
        jobs::start_scheduler(sweep_task.clone(), &config.sweep_schedule, shutdown.clone()).await?;

    if config.sweep_on_startup {
        match sweep_task.spawn(&shutdown) {
            Ok(_) => tracing::info!("Startup sweep started"),
            Err(e) => tracing::warn!(error = %e, "Startup sweep not started"),
        }
    }

    let state = AppState {
        config: config.clone(),
        db,
        sweep_task,
        shutdown: shutdown.clone(),
    };
    let app = build_app(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    scheduler.shutdown().await?;
    tracing::info!("Stale Sweep stopped");
    Ok(())
}

/// Resolve on Ctrl+C and cancel any running sweep
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
