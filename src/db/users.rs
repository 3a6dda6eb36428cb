//! Users repository
//!
//! Viewer accounts only matter to the sweep as keys for watch state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{RowExt, id_text, now_text};
use crate::sweep::User;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for UserRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            id: row.uuid("id")?,
            name: row.try_get("name")?,
            created_at: row.timestamp("created_at")?,
        })
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            name: record.name,
        }
    }
}

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<UserRecord>> {
        let records = sqlx::query_as::<_, UserRecord>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    pub async fn create(&self, name: &str) -> Result<UserRecord> {
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(id_text(id))
            .bind(name)
            .bind(now_text())
            .execute(&self.pool)
            .await?;

        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?1")
            .bind(id_text(id))
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }
}
