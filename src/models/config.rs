//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Table names end up inside SQL text, so only plain identifiers are allowed.
static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid regex"));

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Cursor cache backend settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Checker behavior
    #[serde(default)]
    pub checker: CheckerConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.url.trim().is_empty() {
            return Err(AppError::config("api.url is empty"));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::config("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::config("api.timeout_secs must be > 0"));
        }
        if self.checker.max_concurrent == 0 {
            return Err(AppError::config("checker.max_concurrent must be > 0"));
        }
        if self.checker.poll_interval_secs == 0 {
            return Err(AppError::config("checker.poll_interval_secs must be > 0"));
        }
        self.cache.backend()?;
        Ok(())
    }
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the circular API
    #[serde(default = "defaults::api_url")]
    pub url: String,

    /// Base URL tried once when the primary is unreachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: defaults::api_url(),
            fallback_url: None,
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// How checker cursors are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMethod {
    /// One JSON file holding every cursor
    #[serde(alias = "pickle")]
    File,
    /// A local SQLite database
    #[serde(alias = "sqlite")]
    EmbeddedDb,
    /// A MySQL/MariaDB server
    #[serde(alias = "mysql")]
    NetworkedDb,
}

/// Cursor cache settings, as written in the config file.
///
/// Which fields are required depends on `method`; see [`CacheConfig::backend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub method: CacheMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_table: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_password: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            method: CacheMethod::File,
            file_path: Some(defaults::cache_file()),
            db_path: None,
            db_name: None,
            db_table: None,
            db_host: None,
            db_port: None,
            db_user: None,
            db_password: None,
        }
    }
}

/// A fully resolved cache backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    File {
        path: PathBuf,
    },
    Embedded {
        /// Path of the SQLite database file
        path: PathBuf,
        table: String,
    },
    Networked {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
        table: String,
    },
}

impl CacheConfig {
    /// Resolve the settings into a backend, checking that the parameters
    /// the chosen method needs are all present.
    pub fn backend(&self) -> Result<CacheBackend> {
        match self.method {
            CacheMethod::File => Ok(CacheBackend::File {
                path: required(&self.file_path, "file_path", "file")?.clone(),
            }),
            CacheMethod::EmbeddedDb => {
                let dir = required(&self.db_path, "db_path", "embedded-db")?;
                let name = required(&self.db_name, "db_name", "embedded-db")?;
                let table = required(&self.db_table, "db_table", "embedded-db")?;
                Ok(CacheBackend::Embedded {
                    path: dir.join(format!("{name}.db")),
                    table: table_name(table)?,
                })
            }
            CacheMethod::NetworkedDb => {
                let method = "networked-db";
                Ok(CacheBackend::Networked {
                    host: required(&self.db_host, "db_host", method)?.clone(),
                    port: *required(&self.db_port, "db_port", method)?,
                    user: required(&self.db_user, "db_user", method)?.clone(),
                    password: required(&self.db_password, "db_password", method)?.clone(),
                    database: required(&self.db_name, "db_name", method)?.clone(),
                    table: table_name(required(&self.db_table, "db_table", method)?)?,
                })
            }
        }
    }
}

fn required<'a, T>(value: &'a Option<T>, field: &str, method: &str) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| AppError::config(format!("cache.{field} is required for the {method} cache")))
}

fn table_name(table: &str) -> Result<String> {
    if TABLE_NAME.is_match(table) {
        Ok(table.to_string())
    } else {
        Err(AppError::config(format!(
            "cache.db_table {table:?} is not a valid table name"
        )))
    }
}

/// Checker behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Categories the CLI checks when none are given on the command line
    #[serde(default = "defaults::categories")]
    pub categories: Vec<String>,

    /// Upper bound for one check cycle; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_timeout_secs: Option<u64>,

    /// Maximum checkers polled at once by a group
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay between cycles in watch mode
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            categories: defaults::categories(),
            cycle_timeout_secs: None,
            max_concurrent: defaults::max_concurrent(),
            poll_interval_secs: defaults::poll_interval(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // API defaults
    pub fn api_url() -> String {
        "https://bpsapi.rajtech.me/".into()
    }
    pub fn timeout() -> u64 {
        5
    }
    pub fn user_agent() -> String {
        concat!("circulars/", env!("CARGO_PKG_VERSION")).into()
    }

    // Cache defaults
    pub fn cache_file() -> PathBuf {
        PathBuf::from("data/cursors.json")
    }

    // Checker defaults
    pub fn categories() -> Vec<String> {
        vec!["all".into()]
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn poll_interval() -> u64 {
        300
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
