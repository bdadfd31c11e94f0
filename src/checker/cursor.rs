//! Persisted "last seen" marker for one checker.

use std::sync::Arc;

use crate::error::Result;
use crate::models::Category;
use crate::storage::CursorStore;

/// Cursor of a single checker, stored under its category key.
#[derive(Clone)]
pub struct PollingCursor {
    key: String,
    store: Arc<dyn CursorStore>,
}

impl PollingCursor {
    pub fn new(category: &Category, store: Arc<dyn CursorStore>) -> Self {
        Self {
            key: category.key(),
            store,
        }
    }

    /// Storage key (`"__ALL__"` for the unfiltered checker).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn CursorStore> {
        &self.store
    }

    /// Highest id seen so far, if any.
    pub async fn read(&self) -> Result<Option<i64>> {
        self.store.get(&self.key).await
    }

    /// Persist `id` as the highest id seen.
    pub async fn advance(&self, id: i64) -> Result<()> {
        self.store.put(&self.key, id).await?;
        log::debug!("Cursor {} advanced to {}", self.key, id);
        Ok(())
    }
}

impl std::fmt::Debug for PollingCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCursor")
            .field("key", &self.key)
            .field("store", &self.store.describe())
            .finish()
    }
}
