//! Service layer for talking to the circular API.
//!
//! - `CircularApi`: typed accessors for the read endpoints
//! - `CircularFeed`: the slice of the API a checker polls
//! - `categories`: process-wide category enumeration cache

pub mod api;
pub mod categories;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Circular;

pub use api::CircularApi;

/// Source of newly published circulars.
#[async_trait]
pub trait CircularFeed: Send + Sync {
    /// Category names the feed knows about.
    async fn categories(&self) -> Result<Arc<[String]>>;

    /// Circulars with an id above `since` (all of them when `None`), newest first.
    async fn new_circulars(&self, since: Option<i64>) -> Result<Vec<Circular>>;
}
