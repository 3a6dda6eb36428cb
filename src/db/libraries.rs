//! Library database repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{RowExt, id_text, now_text};
use crate::sweep::Library;

/// Library record from database
#[derive(Debug, Clone)]
pub struct LibraryRecord {
    pub id: Uuid,
    pub name: String,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for LibraryRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            id: row.uuid("id")?,
            name: row.try_get("name")?,
            path: row.try_get("path")?,
            created_at: row.timestamp("created_at")?,
        })
    }
}

impl From<LibraryRecord> for Library {
    fn from(record: LibraryRecord) -> Self {
        Library {
            id: record.id,
            name: record.name,
            path: record.path,
        }
    }
}

/// Input for creating a library
#[derive(Debug)]
pub struct CreateLibrary {
    pub id: Option<Uuid>,
    pub name: String,
    pub path: Option<String>,
}

pub struct LibraryRepository {
    pool: SqlitePool,
}

impl LibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all top-level libraries
    pub async fn list(&self) -> Result<Vec<LibraryRecord>> {
        let records =
            sqlx::query_as::<_, LibraryRecord>("SELECT * FROM libraries ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        Ok(records)
    }

    /// Get a library by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<LibraryRecord>> {
        let record = sqlx::query_as::<_, LibraryRecord>("SELECT * FROM libraries WHERE id = ?1")
            .bind(id_text(id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Create a new library
    pub async fn create(&self, input: CreateLibrary) -> Result<LibraryRecord> {
        let id = input.id.unwrap_or_else(Uuid::new_v4);

        sqlx::query("INSERT INTO libraries (id, name, path, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(id_text(id))
            .bind(&input.name)
            .bind(&input.path)
            .bind(now_text())
            .execute(&self.pool)
            .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve library after insert"))
    }

    /// Delete a library (its items go with it)
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM libraries WHERE id = ?1")
            .bind(id_text(id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
