//! Media item database repository
//!
//! Movies, seasons and episodes form a tree through `parent_id`. Items that
//! sit directly in a library use the library id as their parent.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{RowExt, flag_int, id_text, placeholders, timestamp_text};
use crate::sweep::{ItemKind, ItemQuery, MediaItem};

/// Media item record from database
#[derive(Debug, Clone)]
pub struct MediaItemRecord {
    pub id: Uuid,
    pub library_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: String,
    pub name: String,
    pub path: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub is_virtual: bool,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for MediaItemRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        Ok(Self {
            id: row.uuid("id")?,
            library_id: row.uuid("library_id")?,
            parent_id: row.uuid_opt("parent_id")?,
            kind: row.try_get("kind")?,
            name: row.try_get("name")?,
            path: row.try_get("path")?,
            date_created: row.timestamp_opt("date_created")?,
            is_virtual: row.flag("is_virtual")?,
        })
    }
}

impl TryFrom<MediaItemRecord> for MediaItem {
    type Error = anyhow::Error;

    fn try_from(record: MediaItemRecord) -> Result<Self> {
        let kind: ItemKind = record
            .kind
            .parse()
            .with_context(|| format!("Item {} has an unreadable kind", record.id))?;

        Ok(MediaItem {
            id: record.id,
            kind,
            name: record.name,
            path: record.path,
            date_created: record.date_created,
            parent_id: record.parent_id,
            is_virtual: record.is_virtual,
        })
    }
}

/// Input for creating a media item
#[derive(Debug, Clone)]
pub struct CreateMediaItem {
    pub library_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: ItemKind,
    pub name: String,
    pub path: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub is_virtual: bool,
}

pub struct MediaItemRepository {
    pool: SqlitePool,
}

impl MediaItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List items matching a catalog query, in insertion order
    pub async fn list(&self, query: &ItemQuery) -> Result<Vec<MediaItemRecord>> {
        let mut sql = match (query.parent_id, query.recursive) {
            (Some(_), true) => String::from(
                r#"
                WITH RECURSIVE descendants(id) AS (
                    SELECT id FROM media_items WHERE parent_id = ?
                    UNION ALL
                    SELECT m.id FROM media_items m JOIN descendants d ON m.parent_id = d.id
                )
                SELECT m.* FROM media_items m WHERE m.id IN (SELECT id FROM descendants)
                "#,
            ),
            (Some(_), false) => String::from("SELECT m.* FROM media_items m WHERE m.parent_id = ?"),
            (None, _) => String::from("SELECT m.* FROM media_items m WHERE 1 = 1"),
        };

        if query.exclude_virtual {
            sql.push_str(" AND m.is_virtual = 0");
        }
        if !query.kinds.is_empty() {
            sql.push_str(&format!(" AND m.kind IN ({})", placeholders(query.kinds.len())));
        }
        sql.push_str(" ORDER BY m.rowid");

        let mut q = sqlx::query_as::<_, MediaItemRecord>(&sql);
        if let Some(parent_id) = query.parent_id {
            q = q.bind(id_text(parent_id));
        }
        for kind in &query.kinds {
            q = q.bind(kind.as_str());
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    /// Get an item by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<MediaItemRecord>> {
        let record =
            sqlx::query_as::<_, MediaItemRecord>("SELECT * FROM media_items WHERE id = ?1")
                .bind(id_text(id))
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    /// Create a new item
    pub async fn create(&self, input: CreateMediaItem) -> Result<MediaItemRecord> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO media_items (id, library_id, parent_id, kind, name, path, date_created, is_virtual)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(id_text(id))
        .bind(id_text(input.library_id))
        .bind(input.parent_id.map(id_text))
        .bind(input.kind.as_str())
        .bind(&input.name)
        .bind(&input.path)
        .bind(input.date_created.map(timestamp_text))
        .bind(flag_int(input.is_virtual))
        .execute(&self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Failed to retrieve media item after insert"))
    }
}
