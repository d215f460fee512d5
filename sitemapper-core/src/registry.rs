//! Crawl-wide link catalog.
//!
//! Every distinct normalized URL seen during a crawl gets exactly one
//! [`LinkRecord`]. Records live in an arena; a record's `index` is its arena
//! slot, handed out in first-seen order and never reused.

use serde::{Deserialize, Serialize};
use sitemapper_scanner::{NormalizedUrl, RawLink, normalize_url};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub index: usize,
    /// Most descriptive anchor text seen so far.
    pub text: String,
    pub url: String,
    /// Pages that link here, in the order they were registered.
    pub source_pages: Vec<String>,
    pub on_homepage: bool,
}

impl LinkRecord {
    pub fn normalized(&self) -> NormalizedUrl {
        normalize_url(&self.url)
    }
}

#[derive(Default)]
struct RegistryState {
    records: Vec<LinkRecord>,
    by_url: HashMap<NormalizedUrl, usize>,
}

/// Deduplicating link registry shared by every page of one crawl.
///
/// All methods take `&self`; concurrent registrations of the same URL merge
/// into one record.
#[derive(Default)]
pub struct LinkRegistry {
    state: Mutex<RegistryState>,
    homepage: Option<NormalizedUrl>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that flags links found on `homepage_url`.
    pub fn with_homepage(homepage_url: &str) -> Self {
        Self {
            state: Mutex::default(),
            homepage: Some(normalize_url(homepage_url)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert every link found on `page_url` and return this page's records,
    /// deduplicated, in the order the page lists them.
    ///
    /// Links whose URL normalizes to nothing (bare `#anchors`) are skipped.
    pub fn register(&self, page_url: &str, links: &[RawLink]) -> Vec<LinkRecord> {
        let from_homepage = self
            .homepage
            .as_ref()
            .is_some_and(|home| *home == normalize_url(page_url));

        let mut guard = self.lock();
        let state = &mut *guard;
        let mut page_indices: Vec<usize> = Vec::new();

        for link in links {
            let key = normalize_url(&link.url);
            if key.is_empty() {
                continue;
            }

            let index = match state.by_url.get(&key).copied() {
                Some(index) => {
                    let record = &mut state.records[index];
                    if !record.source_pages.iter().any(|p| p == page_url) {
                        record.source_pages.push(page_url.to_string());
                    }
                    if link.text.chars().count() > record.text.chars().count() {
                        record.text = link.text.clone();
                    }
                    record.on_homepage |= from_homepage;
                    index
                }
                None => {
                    let index = state.records.len();
                    debug!("Registered link #{} {}", index, key);
                    state.records.push(LinkRecord {
                        index,
                        text: link.text.clone(),
                        url: link.url.clone(),
                        source_pages: vec![page_url.to_string()],
                        on_homepage: from_homepage,
                    });
                    state.by_url.insert(key, index);
                    index
                }
            };

            if !page_indices.contains(&index) {
                page_indices.push(index);
            }
        }

        page_indices
            .into_iter()
            .map(|index| state.records[index].clone())
            .collect()
    }

    /// All records ordered by index. Stable across calls.
    pub fn to_list(&self) -> Vec<LinkRecord> {
        self.lock().records.clone()
    }

    pub fn get(&self, url: &NormalizedUrl) -> Option<LinkRecord> {
        let state = self.lock();
        state.by_url.get(url).map(|&index| state.records[index].clone())
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
