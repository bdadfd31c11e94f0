//! In-process cursor storage. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::storage::CursorStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    cursors: RwLock<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with cursors.
    pub fn with_cursors<K: Into<String>>(cursors: impl IntoIterator<Item = (K, i64)>) -> Self {
        Self {
            cursors: RwLock::new(cursors.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn provision(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.cursors.read().await.get(key).copied())
    }

    async fn put(&self, key: &str, value: i64) -> Result<()> {
        self.cursors.write().await.insert(key.to_string(), value);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
