//! Library scan request queue
//!
//! Whatever owns catalog indexing drains this table; writers only append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::sqlite_helpers::{RowExt, now_text};

#[derive(Debug, Clone)]
pub struct ScanRequestRecord {
    pub id: i64,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for ScanRequestRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            id: row.try_get("id")?,
            reason: row.try_get("reason")?,
            requested_at: row.timestamp("requested_at")?,
            started_at: row.timestamp_opt("started_at")?,
        })
    }
}

pub struct ScanQueueRepository {
    pool: SqlitePool,
}

impl ScanQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a full library scan
    pub async fn enqueue(&self, reason: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO library_scan_queue (reason, requested_at) VALUES (?1, ?2)")
            .bind(reason)
            .bind(now_text())
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Requests nobody has picked up yet, oldest first
    pub async fn list_pending(&self) -> Result<Vec<ScanRequestRecord>> {
        let records = sqlx::query_as::<_, ScanRequestRecord>(
            "SELECT * FROM library_scan_queue WHERE started_at IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
