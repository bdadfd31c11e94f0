// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::ApiConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &ApiConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Parse an API base URL, making sure relative endpoints join beneath it.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| AppError::config(format!("Invalid API URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::config(format!(
            "API URL {raw:?} must use http or https"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Build an endpoint URL from a base and path segments.
///
/// Segments are percent-encoded, so category names with spaces are safe.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::config(format!("API URL {base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("https://api.example.com/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/");
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(matches!(
            parse_base_url("ftp://api.example.com/"),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            parse_base_url("not a url"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint() {
        let base = parse_base_url("https://api.example.com/v1/").unwrap();
        assert_eq!(
            endpoint(&base, &["latest", "general"]).unwrap().as_str(),
            "https://api.example.com/v1/latest/general"
        );
        assert_eq!(
            endpoint(&base, &["list", "parent teacher"]).unwrap().as_str(),
            "https://api.example.com/v1/list/parent%20teacher"
        );
        assert_eq!(
            endpoint(&base, &["new-circulars", ""]).unwrap().as_str(),
            "https://api.example.com/v1/new-circulars/"
        );
    }
}
