//! Judgment capabilities backed by an OpenAI-compatible chat completions API.
//!
//! Both adapters ask for a JSON object and validate it against the shape
//! they expect before anything downstream sees it.

use crate::config::LlmConfig;
use crate::error::JudgmentError;
use crate::policy::{JudgeRequest, JudgeVerdict, LinkJudge, Pick};
use crate::registry::LinkRecord;
use crate::synth::{SitemapSynthesizer, Synthesis, SynthesisInput};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &LlmConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    /// Send one system + user exchange and decode the reply as `T`.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<T, JudgmentError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key.trim());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                JudgmentError::Timeout
            } else {
                JudgmentError::Transport(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(JudgmentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| JudgmentError::Malformed(format!("unexpected completion body: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| JudgmentError::Malformed("completion has no content".to_string()))?;

        debug!("Model replied with {} byte(s)", content.len());
        serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| JudgmentError::Malformed(format!("reply did not match expected shape: {}", e)))
    }
}

/// Models sometimes wrap JSON in a markdown fence despite being asked not to.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

const JUDGE_SYSTEM: &str = "You are a website information architect. You pick which links on a page \
are worth visiting to understand the overall structure of the site. Reply with a single JSON object only.";

const SYNTH_SYSTEM: &str = "You are a website information architect. You organise crawled pages and \
links into a clear hierarchical sitemap. Reply with a single JSON object only.";

#[derive(Deserialize)]
struct LinkChoiceReply {
    #[serde(default)]
    reasoning: Option<String>,
    links: Vec<Pick>,
}

pub struct LlmLinkJudge {
    chat: Arc<ChatClient>,
}

impl LlmLinkJudge {
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self { chat }
    }
}

pub fn link_judge_prompt(request: &JudgeRequest) -> String {
    let candidates = serde_json::to_string_pretty(&request.candidates).unwrap_or_default();
    format!(
        "Current page title: {title}\n\
         Current page URL: {url}\n\n\
         Choose at most {limit} of the candidate links below to visit next so that the \
         sitemap of this site becomes as complete as possible.\n\
         - Prefer links to major sections and categories of the site.\n\
         - On blog, news or insights pages prefer a varied sample of individual articles.\n\
         - Prefer links whose text suggests articles, posts, case studies or projects.\n\
         - Skip anything already explored: {explored}\n\n\
         Candidates (refer to them by index):\n{candidates}\n\n\
         Reply as JSON: {{\"reasoning\": \"<overall strategy>\", \
         \"links\": [{{\"index\": <candidate index>, \"reason\": \"<why>\"}}]}}",
        title = request.page_title,
        url = request.page_url,
        limit = request.limit,
        explored = request.explored.join(", "),
        candidates = candidates,
    )
}

#[async_trait]
impl LinkJudge for LlmLinkJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgmentError> {
        let reply: LinkChoiceReply = self
            .chat
            .complete_json(JUDGE_SYSTEM, &link_judge_prompt(request))
            .await?;

        Ok(JudgeVerdict {
            reasoning: reply.reasoning,
            picks: reply.links,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkSummary<'a> {
    text: &'a str,
    url: &'a str,
    found_on: String,
    is_on_homepage: bool,
}

pub struct LlmSynthesizer {
    chat: Arc<ChatClient>,
}

impl LlmSynthesizer {
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self { chat }
    }
}

pub fn synthesis_prompt(input: &SynthesisInput<'_>) -> String {
    let titles: HashMap<&str, &str> = input
        .pages
        .iter()
        .map(|page| (page.url.as_str(), page.display_title()))
        .collect();

    let pages_summary = input
        .pages
        .iter()
        .map(|page| {
            format!(
                "Page: {} ({}) - {} links found",
                page.display_title(),
                page.url,
                page.links.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let links: Vec<LinkSummary<'_>> = input
        .links
        .iter()
        .map(|link| LinkSummary {
            text: &link.text,
            url: &link.url,
            found_on: found_on(link, &titles, &input.homepage.url),
            is_on_homepage: link.on_homepage,
        })
        .collect();
    let links_json = serde_json::to_string_pretty(&links).unwrap_or_default();

    format!(
        "Homepage title: {title}\n\
         Homepage URL: {url}\n\
         Total pages crawled: {page_count}\n\
         Total unique links found: {link_count}\n\n\
         Produce two things:\n\
         1. \"description\": a short explanation of the site's purpose and how it is organised.\n\
         2. \"sitemap\": a hierarchical outline of the site, one node per line, each nesting \
         level indented by one more tab character. The first line is the site name followed \
         by \" (Homepage)\"; main sections sit one tab in, their pages two tabs in, and so on.\n\n\
         Guidelines:\n\
         - Decide which links are main sections and which are individual pages, and group \
         related pages under their section.\n\
         - Leave out social media profiles, email addresses and near-duplicate pages.\n\
         - Links found on the homepage are most likely main navigation.\n\
         - List individual articles, posts and case studies under the section they belong to.\n\n\
         Pages crawled:\n{pages}\n\n\
         All unique links with the pages they were found on:\n{links}\n\n\
         Reply as JSON: {{\"description\": \"...\", \"sitemap\": \"...\"}}",
        title = input.homepage.display_title(),
        url = input.homepage.url,
        page_count = input.pages.len(),
        link_count = input.links.len(),
        pages = pages_summary,
        links = links_json,
    )
}

fn found_on(link: &LinkRecord, titles: &HashMap<&str, &str>, homepage_url: &str) -> String {
    link.source_pages
        .iter()
        .map(|page_url| {
            let title = titles.get(page_url.as_str()).copied().unwrap_or(page_url.as_str());
            if page_url == homepage_url {
                format!("{} (Homepage)", title)
            } else {
                title.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl SitemapSynthesizer for LlmSynthesizer {
    async fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<Synthesis, JudgmentError> {
        let synthesis: Synthesis = self
            .chat
            .complete_json(SYNTH_SYSTEM, &synthesis_prompt(input))
            .await?;
        synthesis.validate()
    }
}
