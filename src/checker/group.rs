//! A set of checkers polled together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::checker::checker::CircularChecker;
use crate::error::{AppError, Result};
use crate::models::{CacheConfig, Category, Circular, Config};
use crate::services::{CircularApi, CircularFeed};
use crate::storage::{CursorStore, build_store};

/// Checkers for distinct categories, checked in insertion order.
///
/// Checkers built through [`CircularCheckerGroup::create`] share one cursor
/// store per cache location, so concurrent cycles never race on separate
/// handles to the same file or table.
#[derive(Default)]
pub struct CircularCheckerGroup {
    checkers: Vec<CircularChecker>,
    feed: Option<Arc<dyn CircularFeed>>,
    stores: HashMap<String, Arc<dyn CursorStore>>,
}

impl CircularCheckerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty group whose configured checkers poll `feed` instead
    /// of the API named in the configuration.
    pub fn with_feed(feed: Arc<dyn CircularFeed>) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    /// Build a group from existing checkers.
    pub fn with_checkers(checkers: impl IntoIterator<Item = CircularChecker>) -> Result<Self> {
        let mut group = Self::new();
        for checker in checkers {
            group.add(checker)?;
        }
        Ok(group)
    }

    /// Add a checker. Two checkers sharing a cursor key would overwrite each
    /// other's cursor, so a second checker for the same key is rejected.
    pub fn add(&mut self, checker: CircularChecker) -> Result<()> {
        if self.checkers.iter().any(|c| c.key() == checker.key()) {
            return Err(AppError::invalid_argument(format!(
                "A checker for category {} is already in the group",
                checker.category()
            )));
        }
        self.checkers.push(checker);
        Ok(())
    }

    /// Build a checker from the configuration and add it.
    pub async fn create(&mut self, config: &Config, category: Category) -> Result<()> {
        if self.checkers.iter().any(|c| c.key() == category.key()) {
            return Err(AppError::invalid_argument(format!(
                "A checker for category {category} is already in the group"
            )));
        }

        let feed: Arc<dyn CircularFeed> = match &self.feed {
            Some(feed) => Arc::clone(feed),
            None => Arc::new(CircularApi::new(&config.api)?),
        };
        let store = self.store_for(&config.cache)?;
        let timeout = config.checker.cycle_timeout_secs.map(Duration::from_secs);

        let checker = CircularChecker::with_timeout(category, feed, store, timeout).await?;
        self.add(checker)
    }

    /// Cursor store for a cache section, built once per location.
    fn store_for(&mut self, cache: &CacheConfig) -> Result<Arc<dyn CursorStore>> {
        let store = build_store(cache)?;
        let shared = self
            .stores
            .entry(store.describe())
            .or_insert(store);
        Ok(Arc::clone(shared))
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// Categories of the member checkers, in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.checkers.iter().map(CircularChecker::category)
    }

    /// Check every member in insertion order.
    ///
    /// Stops at the first failing checker; checkers before it have already
    /// advanced their cursors.
    pub async fn check(&mut self) -> Result<HashMap<Category, Vec<Circular>>> {
        let mut results = HashMap::with_capacity(self.checkers.len());
        for checker in &mut self.checkers {
            let circulars = checker.check().await?;
            results.insert(checker.category().clone(), circulars);
        }
        Ok(results)
    }

    /// Check every member with at most `limit` cycles in flight.
    pub async fn check_concurrent(
        &mut self,
        limit: usize,
    ) -> Result<HashMap<Category, Vec<Circular>>> {
        let mut results = HashMap::with_capacity(self.checkers.len());
        let mut cycles = stream::iter(self.checkers.iter_mut())
            .map(|checker| async move {
                let circulars = checker.check().await;
                (checker.category().clone(), circulars)
            })
            .buffer_unordered(limit.max(1));

        while let Some((category, circulars)) = cycles.next().await {
            results.insert(category, circulars?);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for CircularCheckerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircularCheckerGroup")
            .field("checkers", &self.checkers)
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}
