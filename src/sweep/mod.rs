//! Retention sweep engine
//!
//! Decides which catalog items are stale (old and unwatched by every user)
//! and removes their backing files, or only reports them in dry-run mode.
//! Everything outside the decision logic is reached through the traits in
//! this module so the engine can run against the SQLite catalog, the local
//! filesystem, or in-memory fakes in tests.

pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod policy;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use executor::{DeleteExecutor, DeleteOutcome, Filesystem, LocalFilesystem};
pub use model::{
    ItemKind, ItemQuery, Library, MediaItem, SweepConfig, SweepOutcome, SweepResult,
    TvDeleteMode, User, WatchState,
};
pub use orchestrator::{SweepError, SweepService};
pub use policy::{UnplayedOracle, WatchStateOracle, is_stale_leaf, should_delete_season};

/// Library catalog queries the sweep depends on.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List items matching the query, in catalog order.
    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<MediaItem>>;

    /// Look up a library by id. `Ok(None)` when it no longer exists.
    async fn resolve_library(&self, id: Uuid) -> Result<Option<Library>>;

    /// Top-level libraries, for the configuration surface.
    async fn list_libraries(&self) -> Result<Vec<Library>>;

    /// Ask the catalog to reconcile itself with the filesystem.
    async fn queue_rescan(&self) -> Result<()>;
}

/// Per-user watch state lookups.
#[async_trait]
pub trait WatchStateStore: Send + Sync {
    async fn watch_state(&self, user: &User, item: &MediaItem) -> Result<Option<WatchState>>;
}

/// Source of viewer accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>>;
}

/// Receives run progress as a percentage in `[0, 100]`. Must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}
