//! Per-page choice of which links to follow next.
//!
//! Cheap deterministic filters run first; only when something survives them
//! is the external [`LinkJudge`] consulted. Nothing in here returns an error:
//! a failed or nonsensical judgment degrades to "follow nothing from this
//! page".

use crate::error::{CrawlError, JudgmentError};
use crate::registry::LinkRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitemapper_scanner::{NormalizedUrl, PageRecord, host_of};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_LINK_LIMIT: usize = 5;

/// Hosts whose pages say nothing about the structure of the site being mapped.
pub const SOCIAL_HOSTS: &[&str] = &[
    "facebook.com",
    "fb.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "tiktok.com",
    "pinterest.com",
    "threads.net",
    "snapchat.com",
    "whatsapp.com",
    "wa.me",
    "t.me",
    "discord.gg",
    "bsky.app",
];

/// A filtered link as offered to the judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub index: usize,
    pub text: String,
    pub url: String,
}

impl From<&LinkRecord> for Candidate {
    fn from(record: &LinkRecord) -> Self {
        Self {
            index: record.index,
            text: record.text.clone(),
            url: record.url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub page_title: String,
    pub page_url: String,
    pub candidates: Vec<Candidate>,
    /// Normalized URLs already fetched or queued, for context only.
    pub explored: Vec<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub index: usize,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub picks: Vec<Pick>,
}

/// External relevance judgment: which of these candidates are worth a fetch.
///
/// Output is advisory; the policy validates every index it gets back.
#[async_trait]
pub trait LinkJudge: Send + Sync {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgmentError>;
}

/// Judge that needs no external service: it takes same-site candidates in
/// the order the page lists them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameSiteJudge;

#[async_trait]
impl LinkJudge for SameSiteJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgmentError> {
        let site = host_of(&request.page_url);
        let picks: Vec<Pick> = request
            .candidates
            .iter()
            .filter(|c| site.is_some() && host_of(&c.url) == site)
            .take(request.limit)
            .map(|c| Pick {
                index: c.index,
                reason: None,
            })
            .collect();

        Ok(JudgeVerdict {
            reasoning: Some(format!("Followed the first {} same-site link(s) in page order", picks.len())),
            picks,
        })
    }
}

/// A link chosen for the next hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub index: usize,
    pub text: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Selection {
    fn new(record: &LinkRecord, reason: Option<String>) -> Self {
        Self {
            index: record.index,
            text: record.text.clone(),
            url: record.url.clone(),
            reason,
        }
    }
}

/// What the policy decided for one page.
#[derive(Debug, Clone, Default)]
pub struct PolicyDecision {
    pub selections: Vec<Selection>,
    pub reasoning: Option<String>,
    /// Whether the judge was consulted at all.
    pub judged: bool,
    pub error: Option<String>,
}

pub struct ExplorationPolicy {
    judge: Arc<dyn LinkJudge>,
    limit: usize,
}

impl ExplorationPolicy {
    pub fn new(judge: Arc<dyn LinkJudge>) -> Self {
        Self {
            judge,
            limit: DEFAULT_LINK_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Choose at most `limit` of `links` (found on `page`) to fetch next.
    pub async fn select(
        &self,
        page: &PageRecord,
        links: &[LinkRecord],
        explored: &HashSet<NormalizedUrl>,
    ) -> PolicyDecision {
        let candidates = filter_candidates(links, explored);
        debug!(
            "{} of {} link(s) on {} survive filtering",
            candidates.len(),
            links.len(),
            page.url
        );

        if candidates.is_empty() || self.limit == 0 {
            return PolicyDecision::default();
        }

        let mut explored_list: Vec<String> = explored.iter().map(|u| u.to_string()).collect();
        explored_list.sort();

        let request = JudgeRequest {
            page_title: page.display_title().to_string(),
            page_url: page.url.clone(),
            candidates: candidates.iter().map(Candidate::from).collect(),
            explored: explored_list,
            limit: self.limit,
        };

        let verdict = match self.judge.judge(&request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Link judgment failed for {}: {}", page.url, e);
                return PolicyDecision {
                    judged: true,
                    error: Some(e.to_string()),
                    ..PolicyDecision::default()
                };
            }
        };

        PolicyDecision {
            selections: self.resolve_picks(&page.url, &candidates, verdict.picks),
            reasoning: verdict.reasoning,
            judged: true,
            error: None,
        }
    }

    /// Map returned indices back onto the offered candidates, dropping any
    /// that were never offered, repeats, and everything past the limit.
    fn resolve_picks(&self, page_url: &str, candidates: &[LinkRecord], picks: Vec<Pick>) -> Vec<Selection> {
        let offered: HashMap<usize, &LinkRecord> = candidates.iter().map(|c| (c.index, c)).collect();
        let mut taken = HashSet::new();
        let mut selections = Vec::new();

        for pick in picks {
            let Some(record) = offered.get(&pick.index) else {
                let violation = CrawlError::ContractViolation(format!(
                    "judge picked index {} which was not offered for {}",
                    pick.index, page_url
                ));
                warn!("{}", violation);
                continue;
            };
            if !taken.insert(pick.index) {
                continue;
            }
            if selections.len() == self.limit {
                debug!("Judge returned more than {} link(s) for {}; ignoring the rest", self.limit, page_url);
                break;
            }
            selections.push(Selection::new(record, pick.reason));
        }

        selections
    }
}

/// Deterministic pre-filter applied before any judgment call.
pub fn filter_candidates(links: &[LinkRecord], explored: &HashSet<NormalizedUrl>) -> Vec<LinkRecord> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter(|record| is_explorable(record, explored))
        .filter(|record| seen.insert(record.normalized()))
        .cloned()
        .collect()
}

fn is_explorable(record: &LinkRecord, explored: &HashSet<NormalizedUrl>) -> bool {
    let url = record.url.trim();
    if url.is_empty() || url.starts_with('#') {
        return false;
    }

    if let Ok(parsed) = Url::parse(url)
        && parsed.scheme() != "http"
        && parsed.scheme() != "https"
    {
        // mailto:, tel:, javascript:, data: and friends
        return false;
    }

    if is_social_link(url) {
        return false;
    }

    let text = record.text.trim();
    if text.is_empty() || text.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let normalized = record.normalized();
    !normalized.is_empty() && !explored.contains(&normalized)
}

/// True when the URL points at a known social or video-hosting site.
pub fn is_social_link(url: &str) -> bool {
    host_of(url).is_some_and(|host| {
        SOCIAL_HOSTS
            .iter()
            .any(|social| host == *social || host.ends_with(&format!(".{}", social)))
    })
}
