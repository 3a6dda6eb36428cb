//! Database connection and operations
//!
//! The SQLite database is the host side of the sweep: it stores the catalog,
//! users, watch progress and the persisted sweep settings.

pub mod catalog;
pub mod libraries;
pub mod media_items;
pub mod scan_queue;
pub mod schema;
pub mod settings;
pub mod sqlite_helpers;
pub mod users;
pub mod watch_progress;

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use libraries::{CreateLibrary, LibraryRecord, LibraryRepository};
pub use media_items::{CreateMediaItem, MediaItemRecord, MediaItemRepository};
pub use scan_queue::{ScanQueueRepository, ScanRequestRecord};
pub use settings::{SettingRecord, SettingsRepository};
pub use users::{UserRecord, UserRepository};
pub use watch_progress::{WatchProgressRecord, WatchProgressRepository};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the maximum connection pool size from environment or default
    fn get_max_connections() -> u32 {
        std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5)
    }

    /// Open (creating if needed) the database and make sure the schema exists.
    ///
    /// Accepts either a `sqlite:` URL or a plain file path.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = if url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(url)
                .with_context(|| format!("Invalid database URL '{}'", url))?
        } else {
            if let Some(parent) = Path::new(url).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
            }
            SqliteConnectOptions::new().filename(url)
        };
        let options = options.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::get_max_connections())
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database '{}'", url))?;

        schema::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// A private in-memory database with the schema applied.
    ///
    /// Uses a single connection that never expires, since every SQLite
    /// in-memory connection is its own database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        schema::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a library repository
    pub fn libraries(&self) -> LibraryRepository {
        LibraryRepository::new(self.pool.clone())
    }

    /// Get a media item repository
    pub fn media_items(&self) -> MediaItemRepository {
        MediaItemRepository::new(self.pool.clone())
    }

    /// Get a users repository
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Get a watch progress repository
    pub fn watch_progress(&self) -> WatchProgressRepository {
        WatchProgressRepository::new(self.pool.clone())
    }

    /// Get a settings repository
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Get the library scan queue
    pub fn scan_queue(&self) -> ScanQueueRepository {
        ScanQueueRepository::new(self.pool.clone())
    }
}
