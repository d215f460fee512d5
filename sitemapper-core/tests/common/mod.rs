// Shared stubs for core integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use sitemapper_core::JudgmentError;
use sitemapper_core::policy::{JudgeRequest, JudgeVerdict, LinkJudge, Pick};
use sitemapper_core::synth::{SitemapSynthesizer, Synthesis, SynthesisInput};
use sitemapper_scanner::fetcher::PageFetcher;
use sitemapper_scanner::{FetchError, PageRecord, RawLink, normalize_url};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub fn page(url: &str, title: &str, links: &[(&str, &str)]) -> PageRecord {
    PageRecord::new(
        url.to_string(),
        title.to_string(),
        links.iter().map(|(text, href)| RawLink::new(*text, *href)).collect(),
    )
}

/// Serves canned pages keyed by normalized URL; anything else is a 404.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, PageRecord>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: PageRecord) -> Self {
        self.pages.insert(normalize_url(&page.url).to_string(), page);
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(normalize_url(url).to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn was_fetched(&self, url: &str) -> bool {
        let key = normalize_url(url);
        self.calls().iter().any(|called| normalize_url(called) == key)
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<PageRecord, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let key = normalize_url(url).to_string();

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        self.pages.get(&key).cloned().ok_or_else(|| FetchError::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// How a [`StubJudge`] answers.
pub enum JudgeBehavior {
    /// Pick every candidate whose URL contains one of these fragments.
    UrlsContaining(Vec<&'static str>),
    /// Pick the first `n` offered candidates.
    FirstN(usize),
    /// Return exactly these indices, whether offered or not.
    Indices(Vec<usize>),
    /// Every call fails.
    Fail,
}

pub struct StubJudge {
    behavior: JudgeBehavior,
    requests: Mutex<Vec<JudgeRequest>>,
}

impl StubJudge {
    pub fn new(behavior: JudgeBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<JudgeRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LinkJudge for StubJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgmentError> {
        self.requests.lock().unwrap().push(request.clone());

        let indices: Vec<usize> = match &self.behavior {
            JudgeBehavior::UrlsContaining(fragments) => request
                .candidates
                .iter()
                .filter(|c| fragments.iter().any(|f| c.url.contains(f)))
                .map(|c| c.index)
                .collect(),
            JudgeBehavior::FirstN(n) => request.candidates.iter().take(*n).map(|c| c.index).collect(),
            JudgeBehavior::Indices(indices) => indices.clone(),
            JudgeBehavior::Fail => {
                return Err(JudgmentError::Unavailable("stub judge is down".to_string()));
            }
        };

        Ok(JudgeVerdict {
            reasoning: Some(format!("picked {} link(s)", indices.len())),
            picks: indices
                .into_iter()
                .map(|index| Pick {
                    index,
                    reason: Some("looks structural".to_string()),
                })
                .collect(),
        })
    }
}

/// Lists every page title under the homepage, or fails on demand.
pub struct StubSynthesizer {
    fail: bool,
    delay: Option<Duration>,
}

impl StubSynthesizer {
    pub fn ok() -> Self {
        Self { fail: false, delay: None }
    }

    pub fn failing() -> Self {
        Self { fail: true, delay: None }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SitemapSynthesizer for StubSynthesizer {
    async fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<Synthesis, JudgmentError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(JudgmentError::Malformed("no sitemap in reply".to_string()));
        }

        let mut sitemap = format!("{} (Homepage)", input.homepage.display_title());
        for page in input.pages.iter().skip(1) {
            sitemap.push_str(&format!("\n\t{}", page.display_title()));
        }
        Ok(Synthesis {
            sitemap,
            description: Some(format!("{} link(s)", input.links.len())),
        })
    }
}
