//! Single-category new-circular checker.

use std::sync::Arc;
use std::time::Duration;

use crate::checker::cursor::PollingCursor;
use crate::checker::select::select_new;
use crate::error::{AppError, Result};
use crate::models::{Category, Circular, Config};
use crate::services::{CircularApi, CircularFeed};
use crate::storage::{CursorStore, build_store};

/// Lifecycle of a checker's cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerState {
    /// No cycle has run and no cursor was found
    Uninitialized,
    /// A cold-start cycle ran but the feed was empty, so nothing was seeded
    ColdStart,
    /// The cursor holds the newest id this checker is responsible for
    Synced,
}

/// Reports circulars published since the previous check, for one category
/// (or for all of them).
///
/// Each `check` asks the feed for everything above the stored cursor, keeps
/// what belongs to the category, and moves the cursor forward. The very
/// first check against an empty store only seeds the cursor.
pub struct CircularChecker {
    category: Category,
    feed: Arc<dyn CircularFeed>,
    cursor: PollingCursor,
    cycle_timeout: Option<Duration>,
    state: CheckerState,
}

impl CircularChecker {
    /// Create a checker and seed its cursor if the store has none.
    pub async fn new(
        category: Category,
        feed: Arc<dyn CircularFeed>,
        store: Arc<dyn CursorStore>,
    ) -> Result<Self> {
        Self::with_timeout(category, feed, store, None).await
    }

    /// Like [`CircularChecker::new`], bounding each cycle by `cycle_timeout`.
    ///
    /// The category is validated before the store is provisioned.
    pub async fn with_timeout(
        category: Category,
        feed: Arc<dyn CircularFeed>,
        store: Arc<dyn CursorStore>,
        cycle_timeout: Option<Duration>,
    ) -> Result<Self> {
        match &category {
            Category::Name(_) => category.validate(&feed.categories().await?)?,
            other => other.validate(&[])?,
        }

        store.provision().await?;

        let mut checker = Self {
            cursor: PollingCursor::new(&category, store),
            category,
            feed,
            cycle_timeout,
            state: CheckerState::Uninitialized,
        };

        if checker.cursor.read().await?.is_some() {
            checker.state = CheckerState::Synced;
        } else {
            log::info!(
                "No cursor for {} in {}; seeding from the current feed",
                checker.cursor.key(),
                checker.cursor.store().describe()
            );
            checker.check().await?;
        }

        Ok(checker)
    }

    /// Create a checker wired to the configured API and cursor store.
    pub async fn from_config(config: &Config, category: Category) -> Result<Self> {
        let feed: Arc<dyn CircularFeed> = Arc::new(CircularApi::new(&config.api)?);
        let store = build_store(&config.cache)?;
        let timeout = config.checker.cycle_timeout_secs.map(Duration::from_secs);
        Self::with_timeout(category, feed, store, timeout).await
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn state(&self) -> CheckerState {
        self.state
    }

    /// Storage key of this checker's cursor.
    pub fn key(&self) -> &str {
        self.cursor.key()
    }

    /// Current stored cursor.
    pub async fn cursor(&self) -> Result<Option<i64>> {
        self.cursor.read().await
    }

    /// Run one cycle and return the new circulars, oldest first.
    ///
    /// Results for a specific category carry no category field. The
    /// cursor is persisted before returning; if that fails the error is
    /// returned and the same circulars are reported again next cycle.
    ///
    /// The cycle timeout bounds the cursor read and the feed fetch only.
    /// Once a batch is in hand the cursor write always runs to completion,
    /// so a timeout never leaves the cursor past unreported circulars.
    pub async fn check(&mut self) -> Result<Vec<Circular>> {
        let (since, batch) = match self.cycle_timeout {
            None => self.fetch_batch().await?,
            Some(limit) => tokio::time::timeout(limit, self.fetch_batch())
                .await
                .map_err(|_| {
                    AppError::unavailable(format!(
                        "Check for {} timed out after {}s",
                        self.cursor.key(),
                        limit.as_secs_f32()
                    ))
                })??,
        };

        let outcome = select_new(&self.category, batch, since);
        if let Some(id) = outcome.advance_to {
            self.cursor.advance(id).await?;
        }

        self.state = match (since, outcome.advance_to) {
            (None, None) => CheckerState::ColdStart,
            _ => CheckerState::Synced,
        };

        if outcome.has_new() {
            log::info!(
                "{} new circular(s) for {}",
                outcome.circulars.len(),
                self.cursor.key()
            );
        }
        Ok(outcome.circulars)
    }

    /// Read the cursor and fetch everything above it.
    async fn fetch_batch(&self) -> Result<(Option<i64>, Vec<Circular>)> {
        let since = self.cursor.read().await?;
        let batch = self.feed.new_circulars(since).await?;
        log::debug!(
            "Feed returned {} circulars above {:?} for {}",
            batch.len(),
            since,
            self.cursor.key()
        );
        Ok((since, batch))
    }
}

impl std::fmt::Debug for CircularChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircularChecker")
            .field("category", &self.category)
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .finish()
    }
}
