//! Runtime configuration.
//!
//! Defaults are overridden by environment variables, which the CLI then
//! overrides with explicit flags.

use crate::crawl::{DEFAULT_CRAWL_BUDGET, DEFAULT_MAX_DEPTH};
use crate::policy::DEFAULT_LINK_LIMIT;
use sitemapper_scanner::fetcher::DEFAULT_FETCH_TIMEOUT;
use sitemapper_scanner::reader::DEFAULT_READER_ENDPOINT;
use std::time::Duration;

/// Hard ceiling on crawl depth, whatever a caller asks for.
pub const DEPTH_CEILING: usize = 5;
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);
/// Wall-clock ceiling for one request, crawl and synthesis together.
pub const DEFAULT_REQUEST_BUDGET: Duration = Duration::from_secs(60);
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(40),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_READER_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SitemapConfig {
    pub default_depth: usize,
    pub max_depth: usize,
    pub link_limit: usize,
    pub fetch_timeout: Duration,
    pub crawl_budget: Duration,
    pub synthesis_timeout: Duration,
    pub request_budget: Duration,
    pub llm: LlmConfig,
    pub reader: ReaderConfig,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            default_depth: DEFAULT_MAX_DEPTH,
            max_depth: DEPTH_CEILING,
            link_limit: DEFAULT_LINK_LIMIT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            crawl_budget: DEFAULT_CRAWL_BUDGET,
            synthesis_timeout: DEFAULT_SYNTHESIS_TIMEOUT,
            request_budget: DEFAULT_REQUEST_BUDGET,
            llm: LlmConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

impl SitemapConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults plus whatever `lookup` provides. Blank values are
    /// ignored, as are numbers that do not parse.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok()).map(Duration::from_secs);

        let mut config = Self::default();

        if let Some(key) = get("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(url) = get("SITEMAPPER_LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("SITEMAPPER_MODEL") {
            config.llm.model = model;
        }
        if let Some(endpoint) = get("SITEMAPPER_READER_URL") {
            config.reader.endpoint = endpoint;
        }
        if let Some(key) = get("SITEMAPPER_READER_KEY") {
            config.reader.api_key = Some(key);
        }
        if let Some(budget) = secs("SITEMAPPER_BUDGET_SECS") {
            config.crawl_budget = budget;
        }
        if let Some(budget) = secs("SITEMAPPER_REQUEST_BUDGET_SECS") {
            config.request_budget = budget;
        }
        if let Some(timeout) = secs("SITEMAPPER_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = timeout;
        }
        if let Some(depth) = get("SITEMAPPER_DEPTH").and_then(|v| v.parse::<usize>().ok()) {
            config.default_depth = depth;
        }

        config
    }

    /// Requested depth (or the default) pinned into `1..=max_depth`.
    pub fn effective_depth(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_depth)
            .clamp(1, self.max_depth.max(1))
    }

    /// Crawl budget, never longer than the whole request may take.
    pub fn effective_crawl_budget(&self) -> Duration {
        self.crawl_budget.min(self.request_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SitemapConfig::from_lookup(|_| None);
        assert_eq!(config.default_depth, 2);
        assert_eq!(config.link_limit, 5);
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.request_budget, Duration::from_secs(60));
    }

    #[test]
    fn test_environment_overrides() {
        let config = SitemapConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SITEMAPPER_LLM_BASE_URL", "http://localhost:11434/v1/"),
            ("SITEMAPPER_BUDGET_SECS", "20"),
            ("SITEMAPPER_FETCH_TIMEOUT_SECS", "not-a-number"),
            ("SITEMAPPER_MODEL", "   "),
        ]));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.crawl_budget, Duration::from_secs(20));
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_effective_depth() {
        let config = SitemapConfig::default();
        assert_eq!(config.effective_depth(None), 2);
        assert_eq!(config.effective_depth(Some(0)), 1);
        assert_eq!(config.effective_depth(Some(3)), 3);
        assert_eq!(config.effective_depth(Some(50)), DEPTH_CEILING);
    }

    #[test]
    fn test_crawl_budget_capped_by_request_budget() {
        let config = SitemapConfig::from_lookup(lookup(&[
            ("SITEMAPPER_BUDGET_SECS", "90"),
            ("SITEMAPPER_REQUEST_BUDGET_SECS", "50"),
        ]));

        assert_eq!(config.request_budget, Duration::from_secs(50));
        assert_eq!(config.effective_crawl_budget(), Duration::from_secs(50));
        assert_eq!(SitemapConfig::default().effective_crawl_budget(), Duration::from_secs(45));
    }
}
