//! Request/response entry point: crawl, synthesize, and always answer.

use crate::config::SitemapConfig;
use crate::crawl::{CrawlOptions, CrawlOutcome, CrawlProgressCallback, Crawler, FetchFailure, QueuedLink};
use crate::error::{CrawlError, JudgmentError};
use crate::policy::{ExplorationPolicy, LinkJudge};
use crate::synth::{SitemapSynthesizer, SynthesisInput, fallback_outline};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitemapper_scanner::{PageFetcher, ensure_scheme};
use std::sync::Arc;
use tokio::time::{Instant, timeout_at};
use tracing::{info, warn};

fn default_explore() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub depth: Option<usize>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_explore")]
    pub explore: bool,
}

impl SitemapRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: None,
            debug: false,
            explore: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub link_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub crawl_id: String,
    pub started_at: String,
    pub duration_ms: u128,
    pub requested_depth: Option<usize>,
    pub effective_depth: usize,
    pub depth_reached: usize,
    pub unique_links: usize,
    pub pages: Vec<PageSummary>,
    pub visited: Vec<String>,
    pub failures: Vec<FetchFailure>,
    pub judge_errors: Vec<String>,
    pub reasoning: Vec<String>,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapResponse {
    pub sitemap: String,
    pub title: String,
    pub url: String,
    pub pages_explored: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_to_explore: Option<Vec<QueuedLink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wires a fetcher, a link judge and a synthesizer into one crawl-and-map
/// operation. Holds no per-request state, so one service can serve many
/// concurrent requests.
pub struct SitemapService {
    fetcher: Arc<dyn PageFetcher>,
    judge: Arc<dyn LinkJudge>,
    synthesizer: Arc<dyn SitemapSynthesizer>,
    config: SitemapConfig,
    progress: Option<CrawlProgressCallback>,
}

impl SitemapService {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        judge: Arc<dyn LinkJudge>,
        synthesizer: Arc<dyn SitemapSynthesizer>,
        config: SitemapConfig,
    ) -> Self {
        Self {
            fetcher,
            judge,
            synthesizer,
            config,
            progress: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: CrawlProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &SitemapConfig {
        &self.config
    }

    /// Produce a sitemap for `request`. Never fails: upstream problems are
    /// reported in `error` next to whatever could be collected.
    pub async fn handle(&self, request: SitemapRequest) -> SitemapResponse {
        let url = request.url.trim();
        if url.is_empty() {
            let error = CrawlError::InvalidRequest("URL parameter is required".to_string());
            warn!("{}", error);
            return SitemapResponse {
                sitemap: String::new(),
                title: String::new(),
                url: String::new(),
                pages_explored: 0,
                description: None,
                links_to_explore: None,
                debug_info: None,
                error: Some(error.to_string()),
            };
        }

        let started_at: DateTime<Utc> = Utc::now();
        let deadline = Instant::now() + self.config.request_budget;
        let crawl_budget = self.config.effective_crawl_budget();
        let depth = self.config.effective_depth(request.depth);
        let options = CrawlOptions::new(ensure_scheme(url))
            .with_max_depth(depth)
            .with_budget(crawl_budget)
            .with_explore(request.explore);

        let policy = ExplorationPolicy::new(self.judge.clone()).with_limit(self.config.link_limit);
        let mut crawler = Crawler::new(self.fetcher.clone(), policy);
        if let Some(ref callback) = self.progress {
            crawler = crawler.with_progress_callback(callback.clone());
        }

        let outcome = crawler.crawl(options).await;

        if let Some(ref callback) = self.progress {
            callback("Synthesizing sitemap".to_string());
        }
        let (sitemap, description, synthesis_error) = self.synthesize(&outcome, deadline).await;

        let mut errors = Vec::new();
        if let Some(ref error) = outcome.root_error {
            errors.push(error.clone());
        }
        if outcome.timed_out {
            errors.push(CrawlError::BudgetExhausted(crawl_budget).to_string());
        }
        if let Some(ref error) = synthesis_error {
            errors.push(error.clone());
        }

        let debug_info = request.debug.then(|| DebugInfo {
            crawl_id: outcome.crawl_id.to_string(),
            started_at: started_at.to_rfc3339(),
            duration_ms: outcome.elapsed.as_millis(),
            requested_depth: request.depth,
            effective_depth: depth,
            depth_reached: outcome.depth_reached,
            unique_links: outcome.links.len(),
            pages: outcome
                .pages
                .iter()
                .map(|page| PageSummary {
                    url: page.url.clone(),
                    title: page.display_title().to_string(),
                    link_count: page.links.len(),
                })
                .collect(),
            visited: outcome.visited.clone(),
            failures: outcome.failures.clone(),
            judge_errors: outcome.judge_errors.clone(),
            reasoning: outcome.reasoning.clone(),
            timed_out: outcome.timed_out,
            synthesis_error: synthesis_error.clone(),
        });

        info!(
            "Sitemap ready for {} ({} page(s) explored)",
            outcome.root.url,
            outcome.pages_explored()
        );

        SitemapResponse {
            sitemap,
            title: outcome.root.display_title().to_string(),
            url: outcome.root.url.clone(),
            pages_explored: outcome.pages_explored(),
            description,
            links_to_explore: request.explore.then(|| outcome.queued.clone()),
            debug_info,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    /// Synthesis gets its own timeout but never runs past the request deadline.
    async fn synthesize(
        &self,
        outcome: &CrawlOutcome,
        deadline: Instant,
    ) -> (String, Option<String>, Option<String>) {
        let input = SynthesisInput {
            homepage: &outcome.root,
            links: &outcome.links,
            pages: &outcome.pages,
        };

        let synthesis_deadline = deadline.min(Instant::now() + self.config.synthesis_timeout);
        let result = match timeout_at(synthesis_deadline, self.synthesizer.synthesize(&input)).await {
            Ok(Ok(synthesis)) => Ok(synthesis),
            Ok(Err(e)) => Err(CrawlError::from(e)),
            Err(_) => Err(CrawlError::from(JudgmentError::Timeout)),
        };

        match result {
            Ok(synthesis) => (synthesis.sitemap, synthesis.description, None),
            Err(e) => {
                warn!("Sitemap synthesis failed: {}", e);
                let message = e.to_string();
                (
                    fallback_outline(outcome.root.display_title(), &message),
                    None,
                    Some(message),
                )
            }
        }
    }
}
