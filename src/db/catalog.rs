//! Sweep collaborator implementations backed by the database.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::Database;
use crate::services::sweep_task::SweepConfigSource;
use crate::sweep::{
    Catalog, ItemQuery, Library, MediaItem, SweepConfig, User, UserDirectory, WatchState,
    WatchStateStore,
};

/// Settings key holding the persisted [`SweepConfig`].
pub const SWEEP_SETTINGS_KEY: &str = "stale_sweep";

const SWEEP_SETTINGS_CATEGORY: &str = "stale_sweep";

impl Database {
    /// The persisted sweep configuration, or defaults if none was saved.
    pub async fn load_sweep_config(&self) -> Result<SweepConfig> {
        self.settings()
            .load_or(SWEEP_SETTINGS_KEY, SweepConfig::default())
            .await
    }

    pub async fn save_sweep_config(&self, config: &SweepConfig) -> Result<()> {
        self.settings()
            .store(SWEEP_SETTINGS_KEY, SWEEP_SETTINGS_CATEGORY, config)
            .await
    }
}

#[async_trait]
impl Catalog for Database {
    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<MediaItem>> {
        self.media_items()
            .list(query)
            .await?
            .into_iter()
            .map(MediaItem::try_from)
            .collect()
    }

    async fn resolve_library(&self, id: Uuid) -> Result<Option<Library>> {
        Ok(self.libraries().get_by_id(id).await?.map(Library::from))
    }

    async fn list_libraries(&self) -> Result<Vec<Library>> {
        Ok(self
            .libraries()
            .list()
            .await?
            .into_iter()
            .map(Library::from)
            .collect())
    }

    async fn queue_rescan(&self) -> Result<()> {
        let id = self.scan_queue().enqueue("stale sweep deleted media").await?;
        tracing::debug!(request_id = id, "Library scan queued");
        Ok(())
    }
}

#[async_trait]
impl WatchStateStore for Database {
    async fn watch_state(&self, user: &User, item: &MediaItem) -> Result<Option<WatchState>> {
        Ok(self
            .watch_progress()
            .get(user.id, item.id)
            .await?
            .map(|record| WatchState {
                played: record.played,
            }))
    }
}

#[async_trait]
impl UserDirectory for Database {
    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self
            .users()
            .list()
            .await?
            .into_iter()
            .map(User::from)
            .collect())
    }
}

#[async_trait]
impl SweepConfigSource for Database {
    async fn load(&self) -> Result<SweepConfig> {
        self.load_sweep_config().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::TvDeleteMode;

    #[tokio::test]
    async fn test_missing_config_loads_defaults() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(db.load_sweep_config().await.unwrap(), SweepConfig::default());
    }

    #[tokio::test]
    async fn test_config_round_trips_through_settings() {
        let db = Database::connect_in_memory().await.unwrap();
        let config = SweepConfig {
            library_ids: vec![Uuid::new_v4()],
            age_limit_days: 14,
            dry_run: false,
            tv_mode: TvDeleteMode::DeleteSeasonIfAnyUnwatched,
        };
        db.save_sweep_config(&config).await.unwrap();
        assert_eq!(db.load_sweep_config().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_rescan_is_queued() {
        let db = Database::connect_in_memory().await.unwrap();
        db.queue_rescan().await.unwrap();
        let pending = db.scan_queue().list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reason, "stale sweep deleted media");
    }

    #[tokio::test]
    async fn test_unknown_library_resolves_to_none() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(db.resolve_library(Uuid::new_v4()).await.unwrap(), None);
    }
}
