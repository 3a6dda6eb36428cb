//! Integration tests for the REST surface
//!
//! The router is exercised with `tower::ServiceExt::oneshot` against an
//! in-memory SQLite host; the last test runs a real sweep over a temp dir.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header::AUTHORIZATION};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

use stale_sweep::api::auth::AccessTokenClaims;
use stale_sweep::config::Config;
use stale_sweep::db::{CreateLibrary, CreateMediaItem, Database};
use stale_sweep::services::SweepTask;
use stale_sweep::sweep::{ItemKind, LocalFilesystem, SweepConfig, SweepService, TvDeleteMode};
use stale_sweep::{AppState, build_app};

const SECRET: &str = "test-secret";

// ============================================================================
// Helpers
// ============================================================================

async fn test_state() -> AppState {
    let db = Database::connect_in_memory().await.unwrap();
    let host = Arc::new(db.clone());
    let service = SweepService::new(host.clone(), host.clone(), host.clone(), Arc::new(LocalFilesystem));

    AppState {
        config: Arc::new(Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path: "sqlite::memory:".to_string(),
            jwt_secret: SECRET.to_string(),
            sweep_schedule: "0 0 3 * * *".to_string(),
            sweep_on_startup: false,
        }),
        db,
        sweep_task: Arc::new(SweepTask::new(service, host)),
        shutdown: CancellationToken::new(),
    }
}

fn token(role: &str) -> String {
    let claims = AccessTokenClaims {
        sub: Uuid::new_v4().to_string(),
        username: Some("tester".to_string()),
        role: role.to_string(),
        exp: Utc::now().timestamp() + 3600,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, role: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token(role)));
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn wait_until_idle(state: &AppState) {
    for _ in 0..200 {
        if !state.sweep_task.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sweep did not finish");
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn test_health_probes_need_no_auth() {
    let app = build_app(test_state().await);

    let (status, body) = send(&app, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], true);
    assert_eq!(body["sweepRunning"], false);
}

#[tokio::test]
async fn test_sweep_routes_require_an_admin() {
    let app = build_app(test_state().await);

    let (status, body) = send(&app, "GET", "/StaleSweep/Libraries", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["status"], 401);

    let (status, _) = send(&app, "GET", "/StaleSweep/Status", Some("user"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", "/StaleSweep/Run", Some("user"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Configuration surface
// ============================================================================

#[tokio::test]
async fn test_libraries_sorted_case_insensitively_with_compact_ids() {
    let state = test_state().await;
    let mut created = Vec::new();
    for name in ["movies", "Anime", "TV Shows"] {
        let record = state
            .db
            .libraries()
            .create(CreateLibrary {
                id: None,
                name: name.to_string(),
                path: None,
            })
            .await
            .unwrap();
        created.push(record);
    }
    let app = build_app(state);

    let (status, body) = send(&app, "GET", "/StaleSweep/Libraries", Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body.as_array().unwrap().iter().map(|l| l["Name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Anime", "movies", "TV Shows"]);

    let anime_id = body[0]["Id"].as_str().unwrap();
    assert_eq!(anime_id.len(), 32);
    assert_eq!(anime_id, created[1].id.simple().to_string());
    assert!(anime_id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[tokio::test]
async fn test_configuration_defaults_then_update() {
    let state = test_state().await;
    let app = build_app(state.clone());

    let (status, body) = send(&app, "GET", "/StaleSweep/Configuration", Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "LibraryIds": [], "AgeLimitDays": 365, "DryRun": true, "TvMode": "DeleteEpisodes" })
    );

    let library = Uuid::new_v4();
    let update = json!({
        "LibraryIds": [library, library],
        "AgeLimitDays": -5,
        "DryRun": false,
        "TvMode": 1,
    });
    let (status, body) = send(&app, "POST", "/StaleSweep/Configuration", Some("admin"), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["LibraryIds"], json!([library]));

    let stored = state.db.load_sweep_config().await.unwrap();
    assert_eq!(
        stored,
        SweepConfig {
            library_ids: vec![library],
            age_limit_days: -5,
            dry_run: false,
            tv_mode: TvDeleteMode::DeleteSeasonIfAnyUnwatched,
        }
    );
}

// ============================================================================
// Task control
// ============================================================================

#[tokio::test]
async fn test_cancel_when_idle_is_not_found() {
    let app = build_app(test_state().await);

    let (status, body) = send(&app, "POST", "/StaleSweep/Cancel", Some("admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "No sweep is running");
}

#[tokio::test]
async fn test_run_now_over_sqlite_and_local_disk() {
    let dir = TempDir::new().unwrap();
    let old_movie = dir.path().join("movie.mkv");
    let new_movie = dir.path().join("new.mkv");
    std::fs::write(&old_movie, b"old").unwrap();
    std::fs::write(&new_movie, b"new").unwrap();

    let state = test_state().await;
    let library = state
        .db
        .libraries()
        .create(CreateLibrary {
            id: None,
            name: "Movies".to_string(),
            path: Some(dir.path().display().to_string()),
        })
        .await
        .unwrap();
    for (path, age) in [(&old_movie, 40), (&new_movie, 3)] {
        state
            .db
            .media_items()
            .create(CreateMediaItem {
                library_id: library.id,
                parent_id: Some(library.id),
                kind: ItemKind::Movie,
                name: "Movie".to_string(),
                path: Some(path.display().to_string()),
                date_created: Some(Utc::now() - TimeDelta::days(age)),
                is_virtual: false,
            })
            .await
            .unwrap();
    }
    state.db.users().create("alice").await.unwrap();
    state
        .db
        .save_sweep_config(&SweepConfig {
            library_ids: vec![library.id],
            age_limit_days: 30,
            dry_run: false,
            tv_mode: TvDeleteMode::DeleteEpisodes,
        })
        .await
        .unwrap();
    let app = build_app(state.clone());

    let (status, body) = send(&app, "POST", "/StaleSweep/Run", Some("admin"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["running"], true);

    wait_until_idle(&state).await;

    let (status, body) = send(&app, "GET", "/StaleSweep/Status", Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert_eq!(body["progress"], 100.0);
    assert_eq!(
        body["lastResult"],
        json!({ "state": "completed", "scanned": 2, "deleted": 1, "dryRun": false })
    );

    assert!(!old_movie.exists());
    assert!(new_movie.exists());
    assert_eq!(state.db.scan_queue().list_pending().await.unwrap().len(), 1);
}
