//! Watch progress database repository
//!
//! One row per (user, item) the user has interacted with. A missing row means
//! the user never played the item.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{RowExt, flag_int, id_text, now_text};

/// Watch progress record from database
#[derive(Debug, Clone)]
pub struct WatchProgressRecord {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub played: bool,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for WatchProgressRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            user_id: row.uuid("user_id")?,
            item_id: row.uuid("item_id")?,
            played: row.flag("played")?,
            play_count: row.try_get("play_count")?,
            last_played_at: row.timestamp_opt("last_played_at")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }
}

pub struct WatchProgressRepository {
    pool: SqlitePool,
}

impl WatchProgressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get progress for a user and item
    pub async fn get(&self, user_id: Uuid, item_id: Uuid) -> Result<Option<WatchProgressRecord>> {
        let record = sqlx::query_as::<_, WatchProgressRecord>(
            "SELECT * FROM user_item_data WHERE user_id = ?1 AND item_id = ?2",
        )
        .bind(id_text(user_id))
        .bind(id_text(item_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Set the played flag, bumping the play count when marking as played
    pub async fn set_played(&self, user_id: Uuid, item_id: Uuid, played: bool) -> Result<()> {
        let now = now_text();

        sqlx::query(
            r#"
            INSERT INTO user_item_data (user_id, item_id, played, play_count, last_played_at, updated_at)
            VALUES (?1, ?2, ?3, ?3, CASE WHEN ?3 = 1 THEN ?4 END, ?4)
            ON CONFLICT (user_id, item_id) DO UPDATE SET
                played = ?3,
                play_count = play_count + ?3,
                last_played_at = CASE WHEN ?3 = 1 THEN ?4 ELSE last_played_at END,
                updated_at = ?4
            "#,
        )
        .bind(id_text(user_id))
        .bind(id_text(item_id))
        .bind(flag_int(played))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
