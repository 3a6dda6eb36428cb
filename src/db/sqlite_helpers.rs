//! Column encodings for the SQLite schema
//!
//! Ids are stored as hyphenated TEXT, timestamps as RFC 3339 TEXT (rows
//! stamped with SQLite's `datetime('now')` use its `YYYY-MM-DD HH:MM:SS`
//! form instead), and flags as INTEGER 0/1. [`RowExt`] decodes those columns
//! straight out of a row so `FromRow` impls stay one line per field.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::error::BoxDynError;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn id_text(id: Uuid) -> String {
    id.hyphenated().to_string()
}

pub fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub fn now_text() -> String {
    timestamp_text(Utc::now())
}

pub fn flag_int(value: bool) -> i64 {
    i64::from(value)
}

/// Parse either timestamp form found in the database
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, SQLITE_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", text, e))
}

/// `?, ?, ?` with `count` anonymous placeholders
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Typed accessors for the encoded columns
pub trait RowExt {
    fn uuid(&self, column: &str) -> sqlx::Result<Uuid>;
    fn uuid_opt(&self, column: &str) -> sqlx::Result<Option<Uuid>>;
    fn timestamp(&self, column: &str) -> sqlx::Result<DateTime<Utc>>;
    /// NULL and empty text both decode to `None`
    fn timestamp_opt(&self, column: &str) -> sqlx::Result<Option<DateTime<Utc>>>;
    fn flag(&self, column: &str) -> sqlx::Result<bool>;
}

impl RowExt for SqliteRow {
    fn uuid(&self, column: &str) -> sqlx::Result<Uuid> {
        let text: String = self.try_get(column)?;
        decoded(column, Uuid::parse_str(&text))
    }

    fn uuid_opt(&self, column: &str) -> sqlx::Result<Option<Uuid>> {
        let text: Option<String> = self.try_get(column)?;
        text.map(|t| decoded(column, Uuid::parse_str(&t))).transpose()
    }

    fn timestamp(&self, column: &str) -> sqlx::Result<DateTime<Utc>> {
        let text: String = self.try_get(column)?;
        decoded(column, parse_timestamp(&text))
    }

    fn timestamp_opt(&self, column: &str) -> sqlx::Result<Option<DateTime<Utc>>> {
        let text: Option<String> = self.try_get(column)?;
        text.filter(|t| !t.is_empty())
            .map(|t| decoded(column, parse_timestamp(&t)))
            .transpose()
    }

    fn flag(&self, column: &str) -> sqlx::Result<bool> {
        let value: i64 = self.try_get(column)?;
        Ok(value != 0)
    }
}

fn decoded<T, E: Into<BoxDynError>>(column: &str, result: Result<T, E>) -> sqlx::Result<T> {
    result.map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    })
}
