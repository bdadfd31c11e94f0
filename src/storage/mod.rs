//! Storage abstractions for checker cursors.
//!
//! A cursor is the highest circular id a checker has seen, stored under a
//! category key (`"__ALL__"` for the unfiltered checker). Every backend holds
//! at most one value per key and writes are upserts.
//!
//! ## Backends
//!
//! ```text
//! file          one JSON object {"general": 1203, "__ALL__": 1204}
//! embedded-db   SQLite table (category TEXT PRIMARY KEY, latest_circular_id INTEGER)
//! networked-db  MySQL table with the same columns
//! memory        in-process map, nothing persisted
//! ```

pub mod file;
pub mod memory;
pub mod mysql;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CacheBackend, CacheConfig};

// Re-export for convenience
pub use file::FileStore;
pub use memory::MemoryStore;
pub use mysql::MySqlStore;
pub use sqlite::SqliteStore;

/// Trait for cursor storage backends.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Create whatever the backend needs (file, table) if it does not exist yet.
    async fn provision(&self) -> Result<()>;

    /// Read the cursor stored under `key`.
    ///
    /// Content that cannot be decoded reads as `None` so a checker can
    /// always cold-start.
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: i64) -> Result<()>;

    /// Short description for log output.
    fn describe(&self) -> String;
}

/// Build the store selected by the cache configuration.
pub fn build_store(config: &CacheConfig) -> Result<Arc<dyn CursorStore>> {
    let store: Arc<dyn CursorStore> = match config.backend()? {
        CacheBackend::File { path } => Arc::new(FileStore::new(path)),
        CacheBackend::Embedded { path, table } => Arc::new(SqliteStore::new(path, table)),
        CacheBackend::Networked {
            host,
            port,
            user,
            password,
            database,
            table,
        } => Arc::new(MySqlStore::new(&host, port, &user, &password, &database, table)),
    };
    log::debug!("Using cursor store {}", store.describe());
    Ok(store)
}
