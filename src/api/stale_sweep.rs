//! Stale sweep configuration and task control endpoints
//!
//! Mounted under `/StaleSweep`. Every route requires an administrator.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use tracing::info;

use super::auth::RequireAdmin;
use super::error::{ApiError, ApiResult};
use crate::AppState;
use crate::services::TaskStatus;
use crate::sweep::{Catalog, Library, SweepConfig, SweepError};

/// Library option offered to the configuration page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LibraryOption {
    /// Library id as 32 lowercase hex digits, no hyphens
    pub id: String,
    pub name: String,
}

impl From<Library> for LibraryOption {
    fn from(library: Library) -> Self {
        Self {
            id: library.id.simple().to_string(),
            name: library.name,
        }
    }
}

/// Top-level libraries, sorted case-insensitively by name
async fn list_libraries(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<LibraryOption>>> {
    let mut libraries: Vec<LibraryOption> = state
        .db
        .list_libraries()
        .await?
        .into_iter()
        .map(LibraryOption::from)
        .collect();

    libraries.sort_by_cached_key(|l| l.name.to_lowercase());
    Ok(Json(libraries))
}

async fn get_configuration(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> ApiResult<Json<SweepConfig>> {
    Ok(Json(state.db.load_sweep_config().await?))
}

/// Persist a new configuration. Duplicate library ids are dropped; the age
/// limit is stored as given and clamped when a run starts.
async fn update_configuration(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(mut config): Json<SweepConfig>,
) -> ApiResult<Json<SweepConfig>> {
    config.library_ids = config.distinct_library_ids();
    state.db.save_sweep_config(&config).await?;

    info!(
        user_id = %admin.user_id,
        libraries = config.library_ids.len(),
        age_limit_days = config.age_limit_days,
        dry_run = config.dry_run,
        "Stale sweep configuration updated"
    );
    Ok(Json(config))
}

async fn run_now(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<TaskStatus>)> {
    match state.sweep_task.spawn(&state.shutdown) {
        Ok(_) => {
            info!(user_id = %admin.user_id, "Stale sweep started on request");
            Ok((StatusCode::ACCEPTED, Json(state.sweep_task.status())))
        }
        Err(SweepError::AlreadyRunning) => {
            Err(ApiError::Conflict("A sweep is already running".to_string()))
        }
        Err(e) => Err(ApiError::Internal(e.into())),
    }
}

async fn cancel(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    if state.sweep_task.cancel() {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::NotFound("No sweep is running".to_string()))
    }
}

async fn status(RequireAdmin(_): RequireAdmin, State(state): State<AppState>) -> Json<TaskStatus> {
    Json(state.sweep_task.status())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/Libraries", get(list_libraries))
        .route("/Configuration", get(get_configuration).post(update_configuration))
        .route("/Run", post(run_now))
        .route("/Cancel", post(cancel))
        .route("/Status", get(status))
}
