use crate::error::{FetchError, Result};
use crate::normalize::{ensure_scheme, resolve_link};
use crate::result::{PageRecord, RawLink, retain_usable_links};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = "Sitemapper/0.1 (https://github.com/trapdoorsec/sitemapper)";

/// Source of page titles and outbound links.
///
/// Implementations must turn every failure (timeout, bad status, body that
/// cannot be parsed) into a [`FetchError`]; they never panic.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageRecord>;
}

/// Fetches pages directly over HTTP and scrapes them with `scraper`.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> std::result::Result<Self, reqwest::Error> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    /// Use a caller-supplied transport (proxies, custom TLS, test clients).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageRecord> {
        let full_url = ensure_scheme(url);
        debug!("Fetching {}", full_url);

        let response = self
            .client
            .get(&full_url)
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

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        if let Some(ref ct) = content_type
            && !ct.contains("html")
        {
            return Err(FetchError::Malformed {
                url: full_url,
                reason: format!("expected HTML, got {}", ct),
            });
        }

        // Relative links resolve against where we landed after redirects.
        let base = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&full_url, e))?;

        let (title, links) = extract_page(&body, &base).map_err(|reason| FetchError::Malformed {
            url: full_url.clone(),
            reason,
        })?;

        debug!("{} -> {} link(s), title {:?}", full_url, links.len(), title);
        Ok(PageRecord::new(full_url, title, retain_usable_links(links)))
    }
}

/// Pull the document title and every navigable anchor out of an HTML body.
pub fn extract_page(
    html: &str,
    page_url: &str,
) -> std::result::Result<(String, Vec<RawLink>), String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").map_err(|e| e.to_string())?;
    let link_selector = Selector::parse("a[href]").map_err(|e| e.to_string())?;

    let title = document
        .select(&title_selector)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default();

    let mut links = Vec::new();
    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.to_lowercase().starts_with("javascript:") {
            continue;
        }

        links.push(RawLink::new(anchor_text(&element), resolve_link(page_url, href)));
    }

    Ok((title, links))
}

/// Visible anchor text, or the best attribute-based label for icon links.
fn anchor_text(element: &ElementRef<'_>) -> String {
    let text = collapse_whitespace(&element.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }

    for attr in ["aria-label", "title"] {
        if let Some(label) = element.value().attr(attr) {
            let label = collapse_whitespace(label);
            if !label.is_empty() {
                return label;
            }
        }
    }

    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|child| child.value().attr("alt").map(collapse_whitespace))
        .unwrap_or_default()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
