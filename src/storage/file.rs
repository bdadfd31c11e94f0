//! Single-file cursor storage.
//!
//! Every cursor lives in one JSON object keyed by category key. Reads and
//! writes load the whole object, so the file stays small and human-editable:
//!
//! ```text
//! {
//!   "__ALL__": 1204,
//!   "general": 1203
//! }
//! ```
//!
//! Older cache files held a single bare integer for the unfiltered checker;
//! those are read as the `"__ALL__"` entry and rewritten as an object on the
//! next write.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::ALL_CATEGORIES_KEY;
use crate::storage::CursorStore;

type CursorMap = BTreeMap<String, i64>;

/// Locks shared by every `FileStore` on the same file in this process.
static PATH_LOCKS: OnceLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = PATH_LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

/// File-backed cursor store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes load-modify-store cycles on this file within the process.
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            lock: path_lock(&path),
            path,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self
            .path
            .with_extension(format!("tmp.{}", std::process::id()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Load the cursor map, treating unreadable content as empty.
    async fn load(&self) -> Result<CursorMap> {
        let Some(bytes) = self.read_bytes().await? else {
            return Ok(CursorMap::new());
        };
        match parse_cursors(&bytes) {
            Ok(cursors) => Ok(cursors),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable cursor file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(CursorMap::new())
            }
        }
    }
}

/// Decode the file contents: empty, a bare integer, or a key-to-id object.
fn parse_cursors(bytes: &[u8]) -> Result<CursorMap> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(CursorMap::new());
    }

    match serde_json::from_slice::<Value>(bytes)? {
        Value::Null => Ok(CursorMap::new()),
        Value::Number(n) => {
            let id = n
                .as_i64()
                .ok_or_else(|| AppError::protocol(format!("cursor {n} is not an integer")))?;
            Ok(CursorMap::from([(ALL_CATEGORIES_KEY.to_string(), id)]))
        }
        value @ Value::Object(_) => Ok(serde_json::from_value(value)?),
        other => Err(AppError::protocol(format!(
            "expected a cursor object, found {other}"
        ))),
    }
}

#[async_trait]
impl CursorStore for FileStore {
    async fn provision(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        if self.read_bytes().await?.is_none() {
            self.write_bytes(b"{}").await?;
            log::info!("Created cursor file {}", self.path.display());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(key).copied())
    }

    async fn put(&self, key: &str, value: i64) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut cursors = self.load().await?;
        cursors.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&cursors)?;
        self.write_bytes(&bytes).await
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
