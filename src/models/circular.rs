//! Circular data structures.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::CategoryTag;

/// A circular published by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Circular {
    /// Server-assigned id, increasing with publication order
    pub id: i64,

    /// Circular title
    pub title: String,

    /// Full URL to the circular document
    pub link: String,

    /// Category the circular was published under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryTag>,
}

impl Circular {
    /// Drop the category field, for results whose category the caller already knows.
    pub fn without_category(mut self) -> Self {
        self.category = None;
        self
    }

    /// Format circular for display using a template.
    ///
    /// Supported placeholders: `{id}`, `{title}`, `{link}`, `{category}`
    pub fn format(&self, template: &str) -> String {
        let category = self
            .category
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        template
            .replace("{id}", &self.id.to_string())
            .replace("{title}", &self.title)
            .replace("{link}", &self.link)
            .replace("{category}", &category)
    }
}

/// What to search circulars by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// A 4-digit circular id
    Id(u32),
    /// A title substring
    Title(String),
}

impl SearchQuery {
    /// Parse a raw query: exactly four digits is an id, anything else a title.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::invalid_argument("Search query is empty"));
        }
        if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
            // Four ASCII digits always fit a u32.
            if let Ok(id) = raw.parse() {
                return Ok(Self::Id(id));
            }
        }
        Ok(Self::Title(raw.to_string()))
    }

    /// Value sent as the `query` parameter.
    pub fn as_param(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Title(title) => title.clone(),
        }
    }
}

/// The search endpoint returns a single circular or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SearchResult {
    One(Circular),
    Many(Vec<Circular>),
}

impl SearchResult {
    /// Flatten into a list.
    pub fn into_vec(self) -> Vec<Circular> {
        match self {
            Self::One(circular) => vec![circular],
            Self::Many(circulars) => circulars,
        }
    }
}
