//! New-circular detection.
//!
//! ```text
//! CircularCheckerGroup ──► CircularChecker ──► CircularFeed   (fetch above cursor)
//!                                        └──► PollingCursor ──► CursorStore
//! ```
//!
//! - `select`: pure selection of new circulars and the next cursor
//! - `cursor`: per-category cursor over a `CursorStore`
//! - `checker`: one category, one cursor
//! - `group`: several checkers polled together

#[allow(clippy::module_inception)]
pub mod checker;
pub mod cursor;
pub mod group;
pub mod select;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::{CheckerState, CircularChecker};
pub use cursor::PollingCursor;
pub use group::CircularCheckerGroup;
pub use select::{CycleOutcome, select_new};
