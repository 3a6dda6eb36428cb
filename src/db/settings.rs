//! Persisted application settings
//!
//! Each setting is one JSON document stored under a unique key in
//! `app_settings`, grouped by category.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::sqlite_helpers::{RowExt, id_text, now_text};

#[derive(Debug, Clone)]
pub struct SettingRecord {
    pub key: String,
    pub value: JsonValue,
    pub category: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for SettingRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let raw: String = row.try_get("value")?;
        let value = serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
            index: "value".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            key: row.try_get("key")?,
            value,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }
}

pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<SettingRecord>> {
        let record = sqlx::query_as::<_, SettingRecord>(
            "SELECT key, value, category, description, updated_at FROM app_settings WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Decode a setting; `None` when it was never stored
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(record) = self.get(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_value(record.value)
            .with_context(|| format!("Setting '{}' has an unexpected shape", key))?;
        Ok(Some(value))
    }

    pub async fn load_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> Result<T> {
        Ok(self.load(key).await?.unwrap_or(fallback))
    }

    /// Insert or replace a setting
    pub async fn store<T: Serialize + ?Sized>(&self, key: &str, category: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize setting '{}'", key))?;
        let now = now_text();

        sqlx::query(
            r#"
            INSERT INTO app_settings (id, key, value, category, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                category = excluded.category,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id_text(Uuid::new_v4()))
        .bind(key)
        .bind(&json)
        .bind(category)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM app_settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
