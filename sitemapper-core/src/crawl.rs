use crate::error::CrawlError;
use crate::policy::{ExplorationPolicy, Selection};
use crate::registry::{LinkRecord, LinkRegistry};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use sitemapper_scanner::{
    NormalizedUrl, PageFetcher, PageRecord, RawLink, ensure_scheme, normalize_url, resolve_link,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_CRAWL_BUDGET: Duration = Duration::from_secs(45);

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    /// Number of link hops to fetch, counting the root page as 1.
    pub max_depth: usize,
    /// Wall-clock budget for fetching and judging.
    pub budget: Duration,
    /// When false only the root page is fetched.
    pub explore: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            budget: DEFAULT_CRAWL_BUDGET,
            explore: true,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_explore(mut self, explore: bool) -> Self {
        self.explore = explore;
        self
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub url: String,
    pub depth: usize,
    pub error: String,
}

/// A link the policy queued, with where and when it was chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedLink {
    #[serde(flatten)]
    pub selection: Selection,
    pub found_on: String,
    pub depth: usize,
}

/// Everything a crawl collected. Always produced, however badly it went.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub crawl_id: Uuid,
    pub root: PageRecord,
    /// Set when the root page could not be fetched and `root` is a placeholder.
    pub root_error: Option<String>,
    /// Every fetched page, root first, in fetch-level order.
    pub pages: Vec<PageRecord>,
    pub links: Vec<LinkRecord>,
    pub queued: Vec<QueuedLink>,
    pub failures: Vec<FetchFailure>,
    pub judge_errors: Vec<String>,
    pub reasoning: Vec<String>,
    pub visited: Vec<String>,
    pub depth_reached: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl CrawlOutcome {
    /// Pages actually fetched, the root placeholder excluded.
    pub fn pages_explored(&self) -> usize {
        if self.root_error.is_some() {
            self.pages.len().saturating_sub(1)
        } else {
            self.pages.len()
        }
    }
}

/// Mutable state of one crawl. Owned by [`Crawler::crawl`] and nothing else.
struct CrawlState {
    frontier: Vec<PageRecord>,
    visited: HashSet<NormalizedUrl>,
    explored: HashSet<NormalizedUrl>,
    depth: usize,
}

/// Depth-bounded breadth-first crawl driven by an [`ExplorationPolicy`].
///
/// Failures of individual fetches or judgment calls are recorded and
/// skipped; `crawl` itself never fails.
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    policy: ExplorationPolicy,
    progress_callback: Option<CrawlProgressCallback>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, policy: ExplorationPolicy) -> Self {
        Self {
            fetcher,
            policy,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: CrawlProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn report(&self, message: String) {
        if let Some(ref callback) = self.progress_callback {
            callback(message);
        }
    }

    pub async fn crawl(&self, options: CrawlOptions) -> CrawlOutcome {
        let crawl_id = Uuid::new_v4();
        let span = info_span!("crawl", id = %crawl_id, url = %options.url);
        self.run(crawl_id, options).instrument(span).await
    }

    async fn run(&self, crawl_id: Uuid, options: CrawlOptions) -> CrawlOutcome {
        let started = Instant::now();
        let deadline = started + options.budget;
        let max_depth = if options.explore {
            options.max_depth.max(1)
        } else {
            1
        };

        // INIT
        let root_url = ensure_scheme(&options.url);
        let root_key = normalize_url(&root_url);
        info!("Starting crawl of {} (max depth {})", root_url, max_depth);

        let registry = LinkRegistry::with_homepage(&root_url);
        let mut state = CrawlState {
            frontier: Vec::new(),
            visited: HashSet::from([root_key.clone()]),
            explored: HashSet::from([root_key]),
            depth: 1,
        };
        let mut failures = Vec::new();
        let mut queued = Vec::new();
        let mut judge_errors = Vec::new();
        let mut reasoning = Vec::new();
        let mut timed_out = false;

        // FETCH_ROOT
        self.report(format!("Fetching {}", root_url));
        let mut root_error = None;
        let root = match timeout_at(deadline, self.fetcher.fetch(&root_url)).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                warn!("Root page {} failed: {}", root_url, e);
                root_error = Some(CrawlError::from(e).to_string());
                PageRecord::placeholder(root_url.clone())
            }
            Err(_) => {
                warn!("Crawl budget ran out fetching root page {}", root_url);
                timed_out = true;
                root_error = Some(format!("Timed out fetching {}", root_url));
                PageRecord::placeholder(root_url.clone())
            }
        };
        if let Some(ref error) = root_error {
            failures.push(FetchFailure {
                url: root_url.clone(),
                depth: 1,
                error: error.clone(),
            });
        }

        let mut pages = vec![root.clone()];
        state.frontier.push(root.clone());

        loop {
            // EXPAND_FRONTIER: registration is sequential so index order only
            // depends on frontier order.
            let page_links: Vec<Vec<LinkRecord>> = state
                .frontier
                .iter()
                .map(|page| registry.register(&page.url, &resolved_links(page)))
                .collect();

            if state.depth >= max_depth || timed_out || state.frontier.is_empty() {
                break;
            }

            self.report(format!(
                "Depth {}: choosing links from {} page(s)",
                state.depth,
                state.frontier.len()
            ));

            let explored = state.explored.clone();
            let decisions = state
                .frontier
                .iter()
                .zip(page_links.iter())
                .map(|(page, links)| self.policy.select(page, links, &explored));
            let decisions = match timeout_at(deadline, join_all(decisions)).await {
                Ok(decisions) => decisions,
                Err(_) => {
                    warn!("Crawl budget ran out while choosing links at depth {}", state.depth);
                    timed_out = true;
                    break;
                }
            };

            let mut next_urls = Vec::new();
            // Siblings judge against the same snapshot, so two pages may pick one link.
            let mut claimed: HashMap<NormalizedUrl, &str> = HashMap::new();
            for (page, decision) in state.frontier.iter().zip(decisions) {
                if let Some(error) = decision.error {
                    judge_errors.push(format!("{}: {}", page.url, error));
                }
                if let Some(text) = decision.reasoning {
                    reasoning.push(text);
                }
                for selection in decision.selections {
                    let key = normalize_url(&selection.url);
                    if !state.visited.insert(key.clone()) {
                        match claimed.get(&key) {
                            Some(winner) => debug!(
                                "{} lost its pick {} to {} at depth {}",
                                page.url, selection.url, winner, state.depth
                            ),
                            None => debug!("{} already queued; skipping", selection.url),
                        }
                        continue;
                    }
                    claimed.insert(key.clone(), page.url.as_str());
                    state.explored.insert(key);
                    next_urls.push(selection.url.clone());
                    queued.push(QueuedLink {
                        selection,
                        found_on: page.url.clone(),
                        depth: state.depth + 1,
                    });
                }
            }

            if next_urls.is_empty() {
                debug!("Nothing left to explore after depth {}", state.depth);
                break;
            }

            // FETCH_NEXT_FRONTIER
            let next_depth = state.depth + 1;
            self.report(format!("Depth {}: fetching {} page(s)", next_depth, next_urls.len()));

            let mut in_flight: FuturesUnordered<_> = next_urls
                .iter()
                .enumerate()
                .map(|(position, url)| {
                    let fetcher = self.fetcher.clone();
                    async move { (position, url.clone(), fetcher.fetch(url).await) }
                })
                .collect();

            let mut fetched = Vec::new();
            loop {
                let next = timeout_at(deadline, in_flight.next()).await;
                match next {
                    Ok(Some((position, _, Ok(page)))) => {
                        self.report(format!("Fetched {}", extract_url_path(&page.url)));
                        fetched.push((position, page));
                    }
                    Ok(Some((_, url, Err(e)))) => {
                        warn!("Skipping {}: {}", url, e);
                        failures.push(FetchFailure {
                            url,
                            depth: next_depth,
                            error: CrawlError::from(e).to_string(),
                        });
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!("Crawl budget ran out with {} fetch(es) outstanding", in_flight.len());
                        timed_out = true;
                        break;
                    }
                }
            }
            fetched.sort_by_key(|(position, _)| *position);
            let fetched: Vec<PageRecord> = fetched.into_iter().map(|(_, page)| page).collect();

            if fetched.is_empty() {
                break;
            }
            state.depth = next_depth;
            pages.extend(fetched.iter().cloned());
            state.frontier = fetched;
        }

        let mut visited: Vec<String> = state.visited.iter().map(|u| u.to_string()).collect();
        visited.sort();

        let outcome = CrawlOutcome {
            crawl_id,
            root,
            root_error,
            pages,
            links: registry.to_list(),
            queued,
            failures,
            judge_errors,
            reasoning,
            visited,
            depth_reached: state.depth,
            timed_out,
            elapsed: started.elapsed(),
        };

        info!(
            "Crawl complete. {} page(s), {} unique link(s), depth {}{}",
            outcome.pages_explored(),
            outcome.links.len(),
            outcome.depth_reached,
            if timed_out { " (budget exhausted)" } else { "" }
        );
        self.report(format!("Crawl complete: {} page(s) explored", outcome.pages_explored()));

        outcome
    }
}

/// A page's links with every href made absolute against the page itself.
fn resolved_links(page: &PageRecord) -> Vec<RawLink> {
    page.links
        .iter()
        .map(|link| RawLink::new(link.text.clone(), resolve_link(&page.url, &link.url)))
        .collect()
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}
