//! Static schema for the SQLite catalog
//!
//! Tables are created idempotently at connect time. There is no migration
//! history: columns are only ever added with defaults.

use sqlx::SqlitePool;
use tracing::{debug, info};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS libraries (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        path TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS media_items (
        id TEXT PRIMARY KEY NOT NULL,
        library_id TEXT NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
        parent_id TEXT,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        path TEXT,
        date_created TEXT,
        is_virtual INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_media_items_parent ON media_items(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_media_items_library ON media_items(library_id)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_item_data (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        item_id TEXT NOT NULL,
        played INTEGER NOT NULL DEFAULT 0,
        play_count INTEGER NOT NULL DEFAULT 0,
        last_played_at TEXT,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_settings (
        id TEXT PRIMARY KEY NOT NULL,
        key TEXT NOT NULL UNIQUE,
        value TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT 'general',
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS library_scan_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        reason TEXT NOT NULL,
        requested_at TEXT NOT NULL,
        started_at TEXT
    )
    "#,
];

/// Create any missing tables and indexes.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(statements = STATEMENTS.len(), "Schema statements applied");
    info!("Database schema ready");
    Ok(())
}
