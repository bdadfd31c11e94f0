//! Test doubles shared by the checker tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CategoryTag, Circular};
use crate::services::CircularFeed;
use crate::storage::{CursorStore, MemoryStore};

/// In-memory stand-in for the API: holds every published circular and
/// answers `new_circulars` the way the server does.
#[derive(Default)]
pub(crate) struct FakeFeed {
    categories: Vec<String>,
    published: Mutex<Vec<Circular>>,
    requests: Mutex<Vec<Option<i64>>>,
    down: AtomicBool,
    delay: Option<Duration>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self {
            categories: vec!["general".into(), "exam".into(), "ptm".into()],
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn publish(&self, id: i64, category: &str) {
        self.published.lock().unwrap().push(circular(id, category));
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Option<i64>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CircularFeed for FakeFeed {
    async fn categories(&self) -> Result<Arc<[String]>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::unavailable("fake feed is down"));
        }
        Ok(self.categories.clone().into())
    }

    async fn new_circulars(&self, since: Option<i64>) -> Result<Vec<Circular>> {
        self.requests.lock().unwrap().push(since);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::unavailable("fake feed is down"));
        }

        let mut batch: Vec<Circular> = self
            .published
            .lock()
            .unwrap()
            .iter()
            .filter(|c| since.is_none_or(|s| c.id > s))
            .cloned()
            .collect();
        batch.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(batch)
    }
}

/// Store whose reads work but whose writes always fail.
#[derive(Default)]
pub(crate) struct ReadOnlyStore {
    pub provisioned: AtomicBool,
}

#[async_trait]
impl CursorStore for ReadOnlyStore {
    async fn provision(&self) -> Result<()> {
        self.provisioned.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn put(&self, key: &str, _value: i64) -> Result<()> {
        Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("cannot write cursor {key}"),
        )))
    }

    fn describe(&self) -> String {
        "read-only".to_string()
    }
}

/// Store that commits a write, then takes `ack_delay` to acknowledge it.
pub(crate) struct SlowAckStore {
    inner: MemoryStore,
    ack_delay: Duration,
}

impl SlowAckStore {
    pub fn new(inner: MemoryStore, ack_delay: Duration) -> Self {
        Self { inner, ack_delay }
    }
}

#[async_trait]
impl CursorStore for SlowAckStore {
    async fn provision(&self) -> Result<()> {
        self.inner.provision().await
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: i64) -> Result<()> {
        self.inner.put(key, value).await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(())
    }

    fn describe(&self) -> String {
        "slow-ack".to_string()
    }
}

pub(crate) fn circular(id: i64, category: &str) -> Circular {
    Circular {
        id,
        title: format!("Circular {}", id),
        link: format!("https://example.com/{}.pdf", id),
        category: Some(CategoryTag::Name(category.to_string())),
    }
}

pub(crate) fn ids(circulars: &[Circular]) -> Vec<i64> {
    circulars.iter().map(|c| c.id).collect()
}
