//! Page fetcher backed by a hosted reader API.
//!
//! The reader renders the page server-side and answers with a JSON summary
//! (`{"data": {"title": ..., "links": ...}}`), which copes with script-heavy
//! sites that plain HTML scraping misses.

use crate::error::{FetchError, Result};
use crate::fetcher::{DEFAULT_FETCH_TIMEOUT, PageFetcher};
use crate::normalize::{ensure_scheme, resolve_link};
use crate::result::{PageRecord, RawLink, retain_usable_links};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_READER_ENDPOINT: &str = "https://r.jina.ai/";

pub struct ReaderFetcher {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ReaderRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ReaderResponse {
    data: Option<ReaderData>,
}

#[derive(Deserialize)]
struct ReaderData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    links: Value,
}

impl ReaderFetcher {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> std::result::Result<Self, reqwest::Error> {
        Self::with_timeout(endpoint, api_key, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint, api_key))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl PageFetcher for ReaderFetcher {
    async fn fetch(&self, url: &str) -> Result<PageRecord> {
        let full_url = ensure_scheme(url);
        debug!("Fetching {} via reader {}", full_url, self.endpoint);

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-With-Links-Summary", "all")
            .json(&ReaderRequest { url: &full_url });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&full_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: full_url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&full_url, e))?;

        let parsed: ReaderResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
                url: full_url.clone(),
                reason: e.to_string(),
            })?;

        let data = parsed.data.ok_or_else(|| FetchError::Malformed {
            url: full_url.clone(),
            reason: "response has no data object".to_string(),
        })?;

        let links = links_from_value(&data.links)
            .into_iter()
            .map(|link| RawLink::new(link.text, resolve_link(&full_url, &link.url)))
            .collect();

        Ok(PageRecord::new(
            full_url,
            data.title.unwrap_or_default(),
            retain_usable_links(links),
        ))
    }
}

/// Flatten the reader's link summary into ordered `(text, url)` pairs.
///
/// Accepts an object keyed by anchor text whose values are either a URL or a
/// `[text, url]` pair, or an array of `[text, url]` pairs / `{text, url}`
/// objects. Entries of any other shape are skipped.
pub fn links_from_value(value: &Value) -> Vec<RawLink> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, entry)| match entry {
                Value::String(url) => Some(RawLink::new(key.clone(), url.clone())),
                Value::Array(_) => pair_from_array(entry).map(|(text, url)| {
                    let text = if text.trim().is_empty() { key.clone() } else { text };
                    RawLink::new(text, url)
                }),
                _ => None,
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Array(_) => pair_from_array(item).map(|(text, url)| RawLink::new(text, url)),
                Value::Object(obj) => {
                    let url = obj.get("url")?.as_str()?;
                    let text = obj.get("text").and_then(Value::as_str).unwrap_or_default();
                    Some(RawLink::new(text, url))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn pair_from_array(value: &Value) -> Option<(String, String)> {
    let items = value.as_array()?;
    let url = items.get(1).and_then(Value::as_str).unwrap_or_default();
    let text = items.first().and_then(Value::as_str).unwrap_or_default();
    Some((text.to_string(), url.to_string()))
}
