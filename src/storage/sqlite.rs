//! SQLite cursor storage.
//!
//! One row per category key. A connection is opened for each operation and
//! closed right after, so no file handle is held between checks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};

use crate::error::Result;
use crate::storage::CursorStore;

/// SQLite-backed cursor store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    table: String,
}

impl SqliteStore {
    /// Create a store for `table` inside the database file at `path`.
    ///
    /// `table` is interpolated into SQL and must already be a validated identifier.
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        let conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .connect()
            .await?;
        Ok(conn)
    }
}

#[async_trait]
impl CursorStore for SqliteStore {
    async fn provision(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut conn = self.connect().await?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                category TEXT PRIMARY KEY NOT NULL,
                latest_circular_id INTEGER
            )",
            self.table
        );
        sqlx::query(&sql).execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.connect().await?;
        let sql = format!(
            "SELECT latest_circular_id FROM {} WHERE category = ?",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;

        Ok(row.and_then(|row| match row.try_get::<Option<i64>, _>(0) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Ignoring unreadable cursor for {key} in {}: {e}", self.table);
                None
            }
        }))
    }

    async fn put(&self, key: &str, value: i64) -> Result<()> {
        let mut conn = self.connect().await?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (category, latest_circular_id) VALUES (?, ?)",
            self.table
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.path.display(), self.table)
    }
}
