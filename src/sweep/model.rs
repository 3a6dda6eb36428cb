//! Types shared by the sweep engine and its collaborators.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retention window used when nothing has been configured yet.
pub const DEFAULT_AGE_LIMIT_DAYS: i64 = 365;

/// How TV content is swept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "TvModeRepr")]
pub enum TvDeleteMode {
    /// Episodes are judged one by one, like movies.
    #[default]
    DeleteEpisodes,
    /// Whole seasons are removed once every episode is old and at least one is unwatched.
    DeleteSeasonIfAnyUnwatched,
}

/// Stored form of [`TvDeleteMode`]: older configs persist the numeric index.
#[derive(Deserialize)]
#[serde(untagged)]
enum TvModeRepr {
    Index(u8),
    Name(String),
}

impl TryFrom<TvModeRepr> for TvDeleteMode {
    type Error = String;

    fn try_from(value: TvModeRepr) -> Result<Self, Self::Error> {
        match value {
            TvModeRepr::Index(0) => Ok(Self::DeleteEpisodes),
            TvModeRepr::Index(1) => Ok(Self::DeleteSeasonIfAnyUnwatched),
            TvModeRepr::Index(n) => Err(format!("unknown TV mode index {}", n)),
            TvModeRepr::Name(name) => match name.as_str() {
                "DeleteEpisodes" => Ok(Self::DeleteEpisodes),
                "DeleteSeasonIfAnyUnwatched" => Ok(Self::DeleteSeasonIfAnyUnwatched),
                other => Err(format!("unknown TV mode '{}'", other)),
            },
        }
    }
}

/// Retention policy for one sweep run.
///
/// Field names follow the persisted settings document so existing settings
/// blobs load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SweepConfig {
    pub library_ids: Vec<Uuid>,
    pub age_limit_days: i64,
    pub dry_run: bool,
    pub tv_mode: TvDeleteMode,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            library_ids: Vec::new(),
            age_limit_days: DEFAULT_AGE_LIMIT_DAYS,
            dry_run: true,
            tv_mode: TvDeleteMode::DeleteEpisodes,
        }
    }
}

impl SweepConfig {
    /// Library ids with duplicates removed, first occurrence wins.
    pub fn distinct_library_ids(&self) -> Vec<Uuid> {
        let mut seen = HashSet::with_capacity(self.library_ids.len());
        self.library_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Negative limits are treated as zero.
    pub fn effective_age_limit_days(&self) -> i64 {
        self.age_limit_days.max(0)
    }

    /// Items created strictly before this instant are old enough to sweep.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::try_days(self.effective_age_limit_days())
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Kind of a catalog item the sweep cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Episode,
    Season,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Episode => "episode",
            ItemKind::Season => "season",
        }
    }
}

impl FromStr for ItemKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ItemKind::Movie),
            "episode" => Ok(ItemKind::Episode),
            "season" => Ok(ItemKind::Season),
            other => Err(anyhow!("Unknown item kind '{}'", other)),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::Movie => "Movie",
            ItemKind::Episode => "Episode",
            ItemKind::Season => "Season",
        };
        f.write_str(name)
    }
}

/// A catalog item as seen by the sweep. Read-only; owned by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub id: Uuid,
    pub kind: ItemKind,
    pub name: String,
    pub path: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub parent_id: Option<Uuid>,
    pub is_virtual: bool,
}

impl MediaItem {
    /// Backing path, if it is present and not blank.
    pub fn usable_path(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Missing creation dates never count as old.
    pub fn created_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.date_created.is_some_and(|created| created < cutoff)
    }
}

/// A top-level library (collection folder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    pub path: Option<String>,
}

/// A viewer account; only used to key watch-state lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

/// Per-user, per-item watch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchState {
    pub played: bool,
}

/// Filter for catalog item listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub parent_id: Option<Uuid>,
    pub kinds: Vec<ItemKind>,
    pub recursive: bool,
    pub exclude_virtual: bool,
}

impl ItemQuery {
    /// Every real movie, episode and season below `parent_id`.
    pub fn sweep_candidates(parent_id: Uuid) -> Self {
        Self {
            parent_id: Some(parent_id),
            kinds: vec![ItemKind::Movie, ItemKind::Episode, ItemKind::Season],
            recursive: true,
            exclude_virtual: true,
        }
    }

    /// Every real episode below a season.
    pub fn season_episodes(season_id: Uuid) -> Self {
        Self {
            parent_id: Some(season_id),
            kinds: vec![ItemKind::Episode],
            recursive: true,
            exclude_virtual: true,
        }
    }
}

/// Counters produced by a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub scanned: u64,
    pub deleted: u64,
    pub dry_run: bool,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SweepOutcome {
    Completed(SweepResult),
    /// Stopped early; counters cover the work done before the stop.
    Canceled(SweepResult),
}

impl SweepOutcome {
    pub fn result(&self) -> &SweepResult {
        match self {
            SweepOutcome::Completed(result) | SweepOutcome::Canceled(result) => result,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, SweepOutcome::Canceled(_))
    }
}
