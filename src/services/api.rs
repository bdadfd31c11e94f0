// src/services/api.rs

//! Typed client for the circular API.
//!
//! Every endpoint except `new-circulars` answers with the envelope
//! `{"http_status": <int>, "data": <any>}`. A well-formed envelope with a
//! status other than 200 means "no data" and is returned as `None`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, Category, Circular, SearchQuery, SearchResult};
use crate::services::{CircularFeed, categories};
use crate::utils::http::{create_client, endpoint, parse_base_url};

/// Client for the circular API read endpoints.
#[derive(Debug, Clone)]
pub struct CircularApi {
    client: Client,
    base_url: Url,
    fallback_url: Option<Url>,
}

impl CircularApi {
    /// Create a client from API settings.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.url)?;
        let fallback_url = config
            .fallback_url
            .as_deref()
            .map(parse_base_url)
            .transpose()?;

        Ok(Self {
            client: create_client(config)?,
            base_url,
            fallback_url,
        })
    }

    /// Primary base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Category names served by the API, cached per base URL.
    pub async fn categories(&self) -> Result<Arc<[String]>> {
        if let Some(categories) = categories::cached(self.base_url.as_str()) {
            return Ok(categories);
        }

        let body = self.get_json(&["categories"], &[]).await?;
        let names: Vec<String> = unwrap_envelope(body)?.ok_or_else(|| {
            AppError::protocol("Invalid API response. API says there are no categories")
        })?;
        log::debug!("Fetched {} categories from {}", names.len(), self.base_url);

        Ok(categories::store(self.base_url.as_str(), names))
    }

    /// Drop the cached category list so the next lookup refetches it.
    pub fn invalidate_categories(&self) {
        categories::invalidate(self.base_url.as_str());
    }

    /// Check a category, fetching the enumeration only for names.
    pub async fn validate_category(&self, category: &Category) -> Result<()> {
        match category {
            Category::Name(_) => category.validate(&self.categories().await?),
            _ => category.validate(&[]),
        }
    }

    /// Latest circular of a category.
    pub async fn latest(&self, category: &Category) -> Result<Option<Circular>> {
        let segment = category.path_segment()?;
        self.validate_category(category).await?;

        let body = self.get_json(&["latest", &segment], &[]).await?;
        let latest: Option<Option<Circular>> = unwrap_envelope(body)?;
        Ok(latest.flatten())
    }

    /// Circulars of a category in server order, truncated to `limit` when it is at least 1.
    pub async fn list(
        &self,
        category: &Category,
        limit: Option<usize>,
    ) -> Result<Option<Vec<Circular>>> {
        let segment = category.path_segment()?;
        self.validate_category(category).await?;

        let body = self.get_json(&["list", &segment], &[]).await?;
        let circulars: Option<Vec<Circular>> = unwrap_envelope(body)?;
        Ok(circulars.map(|mut circulars| {
            if let Some(limit) = limit.filter(|limit| *limit >= 1) {
                circulars.truncate(limit);
            }
            circulars
        }))
    }

    /// Search circulars by id or title.
    pub async fn search(&self, query: &SearchQuery, amount: u32) -> Result<Option<SearchResult>> {
        if amount == 0 {
            return Err(AppError::invalid_argument("Search amount must be at least 1"));
        }

        let params = [("query", query.as_param()), ("amount", amount.to_string())];
        let body = self.get_json(&["search"], &params).await?;
        unwrap_envelope(body)
    }

    /// Image URLs rendered from a circular document.
    pub async fn get_images(&self, url: &str) -> Result<Option<Vec<String>>> {
        let url = Url::parse(url)
            .map_err(|e| AppError::invalid_argument(format!("Invalid URL {url:?}: {e}")))?;

        let body = self
            .get_json(&["getpng"], &[("url", url.to_string())])
            .await?;
        unwrap_envelope(body)
    }

    /// Circulars newer than `since`, or every circular when `since` is `None`.
    ///
    /// The API returns them newest first.
    pub async fn new_circulars(&self, since: Option<i64>) -> Result<Vec<Circular>> {
        let cursor = since.map(|id| id.to_string()).unwrap_or_default();
        let body = self.get_json(&["new-circulars", &cursor], &[]).await?;
        feed_data(body)
    }

    /// GET an endpoint, retrying once against the fallback URL when the primary is down.
    async fn get_json(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Value> {
        match self.fetch(&self.base_url, segments, query).await {
            Err(e) if e.is_unavailable() => {
                let Some(fallback) = &self.fallback_url else {
                    return Err(e);
                };
                log::warn!(
                    "API at {} is down ({}). Trying fallback API URL {}",
                    self.base_url,
                    e,
                    fallback
                );
                self.fetch(fallback, segments, query).await.map_err(|e| {
                    if e.is_unavailable() {
                        AppError::unavailable(format!("Both API URLs are down: {e}"))
                    } else {
                        e
                    }
                })
            }
            result => result,
        }
    }

    async fn fetch(&self, base: &Url, segments: &[&str], query: &[(&str, String)]) -> Result<Value> {
        let mut url = endpoint(base, segments)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }

        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::unavailable(format!("GET {url}: {e}")))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::unavailable(format!("GET {url}: {e}")))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::protocol(format!("GET {url} returned {status} with a non-JSON body: {e}"))
        })
    }
}

#[async_trait]
impl CircularFeed for CircularApi {
    async fn categories(&self) -> Result<Arc<[String]>> {
        CircularApi::categories(self).await
    }

    async fn new_circulars(&self, since: Option<i64>) -> Result<Vec<Circular>> {
        CircularApi::new_circulars(self, since).await
    }
}

/// Unwrap an `{http_status, data}` envelope.
///
/// Both keys must be present. A status other than 200 yields `None`.
fn unwrap_envelope<T: DeserializeOwned>(body: Value) -> Result<Option<T>> {
    let Value::Object(mut envelope) = body else {
        return Err(AppError::protocol("Invalid API response, expected a JSON object"));
    };

    let status = envelope.get("http_status").cloned();
    let data = envelope.remove("data");
    let (Some(status), Some(data)) = (status, data) else {
        return Err(AppError::protocol(
            "Invalid API response, it doesn't contain either 'data' or 'http_status'",
        ));
    };

    let status = status
        .as_i64()
        .ok_or_else(|| AppError::protocol(format!("Invalid http_status {status}")))?;
    if status != 200 {
        log::debug!("API answered with http_status {}; treating as no data", status);
        return Ok(None);
    }

    serde_json::from_value(data)
        .map(Some)
        .map_err(|e| AppError::protocol(format!("Unexpected data in API response: {e}")))
}

/// Extract the circular list from a `new-circulars` response.
fn feed_data(body: Value) -> Result<Vec<Circular>> {
    let Value::Object(mut envelope) = body else {
        return Err(AppError::protocol("Invalid API response, expected a JSON object"));
    };

    if let Some(status) = envelope.get("http_status") {
        if status.as_i64() != Some(200) {
            return Err(AppError::protocol(format!(
                "new-circulars answered with http_status {status}"
            )));
        }
    }

    let data = envelope
        .remove("data")
        .ok_or_else(|| AppError::protocol("Invalid API response, it doesn't contain 'data'"))?;
    serde_json::from_value(data)
        .map_err(|e| AppError::protocol(format!("Unexpected circulars in API response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer exactly one HTTP request with `body`, yielding the request line.
    async fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            request.lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{addr}/"), handle)
    }

    /// A base URL nothing is listening on.
    async fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/")
    }

    fn api(url: String, fallback_url: Option<String>) -> CircularApi {
        CircularApi::new(&ApiConfig {
            url,
            fallback_url,
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_unwrap_envelope_ok() {
        let body = json!({"http_status": 200, "data": ["general", "exam"]});
        let data: Option<Vec<String>> = unwrap_envelope(body).unwrap();
        assert_eq!(data.unwrap(), vec!["general", "exam"]);
    }

    #[test]
    fn test_unwrap_envelope_non_200_is_none() {
        let body = json!({"http_status": 404, "data": null});
        let data: Option<Vec<String>> = unwrap_envelope(body).unwrap();
        assert!(data.is_none());
    }

    #[test]
    fn test_unwrap_envelope_missing_fields() {
        let missing_status = json!({"data": []});
        let missing_data = json!({"http_status": 200});
        assert!(matches!(
            unwrap_envelope::<Vec<String>>(missing_status),
            Err(AppError::Protocol(_))
        ));
        assert!(matches!(
            unwrap_envelope::<Vec<String>>(missing_data),
            Err(AppError::Protocol(_))
        ));
    }

    #[test]
    fn test_unwrap_envelope_null_latest() {
        let body = json!({"http_status": 200, "data": null});
        let latest: Option<Option<Circular>> = unwrap_envelope(body).unwrap();
        assert_eq!(latest.flatten(), None);
    }

    #[test]
    fn test_feed_data() {
        let body = json!({"data": [
            {"id": 105, "title": "a", "link": "l1", "category": "general"},
            {"id": 104, "title": "b", "link": "l2", "category": "exam"}
        ]});
        let circulars = feed_data(body).unwrap();
        assert_eq!(circulars.len(), 2);
        assert_eq!(circulars[0].id, 105);

        assert!(matches!(feed_data(json!({})), Err(AppError::Protocol(_))));
        assert!(matches!(
            feed_data(json!({"http_status": 500, "data": []})),
            Err(AppError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_new_circulars_since_cursor() {
        let (url, server) =
            serve_once(r#"{"data": [{"id": 101, "title": "t", "link": "l", "category": "exam"}]}"#)
                .await;

        let circulars = api(url, None).new_circulars(Some(100)).await.unwrap();
        assert_eq!(circulars.len(), 1);
        assert_eq!(circulars[0].id, 101);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /new-circulars/100 "));
    }

    #[tokio::test]
    async fn test_list_truncates_to_limit() {
        let (url, server) = serve_once(
            r#"{"http_status": 200, "data": [
                {"id": 3, "title": "c", "link": "l"},
                {"id": 2, "title": "b", "link": "l"},
                {"id": 1, "title": "a", "link": "l"}
            ]}"#,
        )
        .await;

        let circulars = api(url, None)
            .list(&Category::Id(30), Some(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(circulars.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3, 2]);
        assert!(server.await.unwrap().starts_with("GET /list/30 "));
    }

    #[tokio::test]
    async fn test_latest_uses_cached_categories() {
        let (url, server) = serve_once(r#"{"http_status": 200, "data": null}"#).await;
        categories::store(&url, vec!["general".into()]);

        let latest = api(url.clone(), None)
            .latest(&Category::Name("general".into()))
            .await
            .unwrap();
        assert!(latest.is_none());
        assert!(server.await.unwrap().starts_with("GET /latest/general "));
        categories::invalidate(&url);
    }

    #[tokio::test]
    async fn test_search_sends_query() {
        let (url, server) =
            serve_once(r#"{"http_status": 200, "data": {"id": 1204, "title": "t", "link": "l"}}"#)
                .await;

        let result = api(url, None)
            .search(&SearchQuery::parse("1204").unwrap(), 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.into_vec()[0].id, 1204);
        assert!(server.await.unwrap().starts_with("GET /search?query=1204&amount=1 "));
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_is_down() {
        let (fallback, server) = serve_once(r#"{"data": []}"#).await;

        let circulars = api(dead_url().await, Some(fallback))
            .new_circulars(None)
            .await
            .unwrap();
        assert!(circulars.is_empty());
        assert!(server.await.unwrap().starts_with("GET /new-circulars/ "));
    }

    #[tokio::test]
    async fn test_unavailable_without_fallback() {
        let result = api(dead_url().await, None).new_circulars(None).await;
        assert!(matches!(result, Err(AppError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_unavailable_when_both_urls_are_down() {
        let result = api(dead_url().await, Some(dead_url().await))
            .new_circulars(Some(1))
            .await;
        assert!(matches!(result, Err(AppError::Unavailable(m)) if m.contains("Both")));
    }

    #[tokio::test]
    async fn test_argument_validation_happens_before_network() {
        let client = api(dead_url().await, None);

        assert!(matches!(
            client.latest(&Category::Id(3)).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.list(&Category::All, None).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.get_images("not a url").await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.search(&SearchQuery::Title("x".into()), 0).await,
            Err(AppError::InvalidArgument(_))
        ));
    }
}
