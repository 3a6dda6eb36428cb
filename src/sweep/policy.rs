//! Staleness rules
//!
//! Leaf items (movies, episodes) are stale when they were created before the
//! cutoff and no user has played them. Seasons use a group rule: age is an
//! all-or-nothing gate over the episodes, unwatched-ness is an any-match
//! trigger.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::model::{ItemKind, MediaItem, TvDeleteMode, User};
use super::WatchStateStore;

/// Answers "has nobody played this item?"
#[async_trait]
pub trait UnplayedOracle: Send + Sync {
    async fn is_unplayed_by_all_users(&self, item: &MediaItem) -> bool;
}

/// [`UnplayedOracle`] backed by a watch-state store and a user snapshot taken
/// at the start of a run.
pub struct WatchStateOracle {
    users: Vec<User>,
    store: Arc<dyn WatchStateStore>,
}

impl WatchStateOracle {
    pub fn new(users: Vec<User>, store: Arc<dyn WatchStateStore>) -> Self {
        Self { users, store }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl UnplayedOracle for WatchStateOracle {
    async fn is_unplayed_by_all_users(&self, item: &MediaItem) -> bool {
        for user in &self.users {
            match self.store.watch_state(user, item).await {
                Ok(Some(state)) if state.played => return false,
                Ok(_) => {}
                Err(e) => {
                    // Unknown watch state must not make an item deletable.
                    warn!(
                        item_id = %item.id,
                        user_id = %user.id,
                        error = %e,
                        "Failed to read watch state; treating item as played"
                    );
                    return false;
                }
            }
        }
        true
    }
}

/// Whether a movie or episode is stale.
///
/// Items without a creation date are never stale. Seasons are not leaves and
/// always return `false` here.
pub async fn is_stale_leaf<O>(item: &MediaItem, cutoff: DateTime<Utc>, oracle: &O) -> bool
where
    O: UnplayedOracle + ?Sized,
{
    match item.kind {
        ItemKind::Movie | ItemKind::Episode => {}
        ItemKind::Season => return false,
    }

    if !item.created_before(cutoff) {
        return false;
    }

    oracle.is_unplayed_by_all_users(item).await
}

/// Whether a whole season should be removed.
///
/// `episodes` must be the full recursive listing of real episodes under
/// `season`. The season itself must predate the cutoff; an undated season is
/// never deleted. An empty season is always kept, one recent episode keeps
/// the whole season, and a fully watched season is kept regardless of age.
pub async fn should_delete_season<O>(
    season: &MediaItem,
    episodes: &[MediaItem],
    cutoff: DateTime<Utc>,
    oracle: &O,
    tv_mode: TvDeleteMode,
) -> bool
where
    O: UnplayedOracle + ?Sized,
{
    if tv_mode != TvDeleteMode::DeleteSeasonIfAnyUnwatched {
        return false;
    }

    if !season.created_before(cutoff) {
        return false;
    }

    if episodes.is_empty() {
        debug!(season_id = %season.id, "Season has no episodes; keeping");
        return false;
    }

    if !episodes.iter().all(|e| e.created_before(cutoff)) {
        debug!(season_id = %season.id, "Season has recent episodes; keeping");
        return false;
    }

    for episode in episodes {
        if oracle.is_unplayed_by_all_users(episode).await {
            return true;
        }
    }

    debug!(season_id = %season.id, "Every episode has been watched; keeping");
    false
}
