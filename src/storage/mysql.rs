//! MySQL/MariaDB cursor storage.
//!
//! Same table layout as the SQLite store. The pool is created on first use
//! and connects lazily; each operation checks a connection out and returns
//! it when the query finishes.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tokio::sync::OnceCell;

use crate::error::Result;
use crate::storage::CursorStore;

const MAX_CONNECTIONS: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// MySQL-backed cursor store.
pub struct MySqlStore {
    options: MySqlConnectOptions,
    table: String,
    location: String,
    pool: OnceCell<MySqlPool>,
}

impl MySqlStore {
    /// Create a store for `table` in `database` on the given server.
    ///
    /// `table` is interpolated into SQL and must already be a validated identifier.
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        database: &str,
        table: impl Into<String>,
    ) -> Self {
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(user)
            .password(password)
            .database(database);
        Self::with_options(options, table)
    }

    /// Create a store from prepared connection options.
    pub fn with_options(options: MySqlConnectOptions, table: impl Into<String>) -> Self {
        let location = format!(
            "{}@{}:{}/{}",
            options.get_username(),
            options.get_host(),
            options.get_port(),
            options.get_database().unwrap_or_default()
        );

        Self {
            options,
            table: table.into(),
            location,
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> &MySqlPool {
        self.pool
            .get_or_init(|| async {
                MySqlPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect_lazy_with(self.options.clone())
            })
            .await
    }
}

#[async_trait]
impl CursorStore for MySqlStore {
    async fn provision(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                category VARCHAR(64) NOT NULL PRIMARY KEY,
                latest_circular_id BIGINT
            )",
            self.table
        );
        sqlx::query(&sql).execute(self.pool().await).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT latest_circular_id FROM {} WHERE category = ?",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(self.pool().await)
            .await?;

        Ok(row.and_then(|row| match row.try_get::<Option<i64>, _>(0) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Ignoring unreadable cursor for {key} in {}: {e}", self.table);
                None
            }
        }))
    }

    async fn put(&self, key: &str, value: i64) -> Result<()> {
        let sql = format!(
            "REPLACE INTO {} (category, latest_circular_id) VALUES (?, ?)",
            self.table
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .execute(self.pool().await)
            .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mysql:{}#{}", self.location, self.table)
    }
}
