//! Circular categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Smallest category id the API hands out.
pub const MIN_CATEGORY_ID: i64 = 23;

/// Cursor key used by checkers that do not filter by category.
pub const ALL_CATEGORIES_KEY: &str = "__ALL__";

/// The category a checker or API call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Every category; no filtering.
    All,
    /// A numeric category id.
    Id(i64),
    /// A category name from the server's enumeration.
    Name(String),
}

impl Category {
    /// Parse user input into a category.
    ///
    /// Digit strings become ids. A digit string too long for an `i64` cannot
    /// be coerced and is kept as a name, with a warning.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.eq_ignore_ascii_case("all") || input == ALL_CATEGORIES_KEY {
            return Self::All;
        }
        if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            match input.parse::<i64>() {
                Ok(id) => return Self::Id(id),
                Err(_) => log::warn!(
                    "Category id {input} is all digits but does not fit an integer; \
                     treating it as a category name"
                ),
            }
        }
        Self::Name(input.to_string())
    }

    /// Storage key for cursors tracked under this category.
    pub fn key(&self) -> String {
        match self {
            Self::All => ALL_CATEGORIES_KEY.to_string(),
            Self::Id(id) => id.to_string(),
            Self::Name(name) => name.clone(),
        }
    }

    /// Whether this is the unfiltered sentinel.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Check the category against the server's enumeration.
    pub fn validate(&self, categories: &[String]) -> Result<()> {
        match self {
            Self::All => Ok(()),
            Self::Id(id) if *id >= MIN_CATEGORY_ID => Ok(()),
            Self::Id(id) => Err(AppError::invalid_argument(format!(
                "Invalid category id {id}; ids start at {MIN_CATEGORY_ID}"
            ))),
            Self::Name(name) if categories.iter().any(|c| c == name) => Ok(()),
            Self::Name(name) => Err(AppError::invalid_argument(format!(
                "Invalid category name ({name}). Allowed are {categories:?}"
            ))),
        }
    }

    /// Whether a circular tagged with `tag` belongs to this category.
    ///
    /// Ids compare numerically, names by string equality.
    pub fn matches(&self, tag: Option<&CategoryTag>) -> bool {
        match (self, tag) {
            (Self::All, _) => true,
            (_, None) => false,
            (Self::Id(id), Some(CategoryTag::Id(other))) => id == other,
            (Self::Id(id), Some(CategoryTag::Name(name))) => {
                name.trim().parse::<i64>().is_ok_and(|n| n == *id)
            }
            (Self::Name(name), Some(tag)) => *name == tag.to_string(),
        }
    }

    /// Path segment used by the `latest` and `list` endpoints.
    pub(crate) fn path_segment(&self) -> Result<String> {
        match self {
            Self::All => Err(AppError::invalid_argument(
                "This endpoint needs a specific category",
            )),
            other => Ok(other.key()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_input(s))
    }
}

impl From<i64> for Category {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::from_input(name)
    }
}

/// Category value as the server writes it on a circular.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryTag {
    Id(i64),
    Name(String),
}

impl fmt::Display for CategoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}
