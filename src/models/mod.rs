// src/models/mod.rs

//! Domain models for the circular client.
//!
//! This module contains all data structures used throughout the crate,
//! organized by their primary purpose.

mod category;
mod circular;
mod config;

// Re-export all public types
pub use category::{ALL_CATEGORIES_KEY, Category, CategoryTag, MIN_CATEGORY_ID};
pub use circular::{Circular, SearchQuery, SearchResult};
pub use config::{
    ApiConfig, CacheBackend, CacheConfig, CacheMethod, CheckerConfig, Config, LoggingConfig,
};
