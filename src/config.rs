// src/config.rs

//! Configuration loading utilities.
//!
//! Reads the TOML configuration file and layers environment overrides on
//! top, so deployments can keep URLs and the database password out of the
//! file.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Overrides `api.url`.
pub const ENV_API_URL: &str = "CIRCULARS_API_URL";
/// Overrides `api.fallback_url`.
pub const ENV_FALLBACK_API_URL: &str = "CIRCULARS_FALLBACK_API_URL";
/// Overrides `cache.db_password`.
pub const ENV_DB_PASSWORD: &str = "CIRCULARS_DB_PASSWORD";

/// Load configuration from a TOML file and apply environment overrides.
///
/// A missing file yields the defaults; a file that exists but does not
/// parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let config = Config::load(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        config
    } else {
        log::info!("No config at {}; using defaults", path.display());
        Config::default()
    };

    Ok(apply_overrides(config, |key| std::env::var(key).ok()))
}

/// Apply overrides looked up through `lookup`. Empty values are ignored.
pub fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = get(ENV_API_URL) {
        log::debug!("api.url overridden by {ENV_API_URL}");
        config.api.url = url;
    }
    if let Some(url) = get(ENV_FALLBACK_API_URL) {
        log::debug!("api.fallback_url overridden by {ENV_FALLBACK_API_URL}");
        config.api.fallback_url = Some(url);
    }
    if let Some(password) = get(ENV_DB_PASSWORD) {
        config.cache.db_password = Some(password);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_overrides() {
        let env = HashMap::from([
            (ENV_API_URL, "http://primary.local/"),
            (ENV_FALLBACK_API_URL, "http://backup.local/"),
            (ENV_DB_PASSWORD, "  "),
        ]);
        let config = apply_overrides(Config::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.api.url, "http://primary.local/");
        assert_eq!(config.api.fallback_url.as_deref(), Some("http://backup.local/"));
        assert_eq!(config.cache.db_password, None);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(tmp.path().join("nope.toml"));
        assert!(config.is_err());

        let config = load_config(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(config.checker.categories, vec!["all".to_string()]);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[api\nurl = ").unwrap();
        assert!(load_config(&path).is_err());
    }
}
