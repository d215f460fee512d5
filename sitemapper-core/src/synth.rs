//! Turning a crawl's catalog into a hierarchical outline.

use crate::error::JudgmentError;
use crate::policy::is_social_link;
use crate::registry::LinkRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitemapper_scanner::{PageRecord, host_of, normalize_url};
use std::collections::HashSet;
use url::Url;

/// Everything the synthesizer gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub homepage: &'a PageRecord,
    pub links: &'a [LinkRecord],
    pub pages: &'a [PageRecord],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    /// Tab-indented outline, one node per line, rooted at the site name.
    pub sitemap: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Synthesis {
    /// Reject outputs that cannot be shown as a sitemap.
    pub fn validate(self) -> Result<Self, JudgmentError> {
        if self.sitemap.trim().is_empty() {
            return Err(JudgmentError::Malformed("sitemap is empty".to_string()));
        }
        Ok(self)
    }
}

/// Best-effort, possibly non-deterministic outline synthesis.
#[async_trait]
pub trait SitemapSynthesizer: Send + Sync {
    async fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<Synthesis, JudgmentError>;
}

/// Minimal outline used when synthesis fails: the root plus an error marker.
pub fn fallback_outline(site_name: &str, error: &str) -> String {
    format!("{} (Homepage)\n\t[error: {}]", site_name, error)
}

/// Deterministic synthesizer that nests same-site links by URL path.
///
/// Needs no external service; social, email and off-site links are left out
/// and links that only differ by query string collapse into one node.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSynthesizer;

#[derive(Debug)]
struct PathNode {
    segment: String,
    label: String,
    children: Vec<PathNode>,
}

impl PathNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            label: titleize(segment),
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, segment: &str) -> &mut PathNode {
        let position = match self.children.iter().position(|c| c.segment == segment) {
            Some(position) => position,
            None => {
                self.children.push(PathNode::new(segment));
                self.children.len() - 1
            }
        };
        &mut self.children[position]
    }

    fn render(&self, level: usize, out: &mut String) {
        for child in &self.children {
            out.push_str(&"\t".repeat(level));
            out.push_str(&child.label);
            out.push('\n');
            child.render(level + 1, out);
        }
    }
}

#[async_trait]
impl SitemapSynthesizer for PathSynthesizer {
    async fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<Synthesis, JudgmentError> {
        Synthesis {
            sitemap: outline_by_path(input),
            description: Some(format!(
                "Outline derived from URL paths: {} page(s) crawled, {} unique link(s) catalogued.",
                input.pages.len(),
                input.links.len()
            )),
        }
        .validate()
    }
}

/// Build a tab-indented outline from the URL paths of same-site links.
pub fn outline_by_path(input: &SynthesisInput<'_>) -> String {
    let site_host = host_of(&input.homepage.url);
    let home_key = normalize_url(&input.homepage.url);
    let mut root = PathNode::new("");
    let mut seen_paths = HashSet::new();

    for link in input.links {
        if is_social_link(&link.url) || normalize_url(&link.url) == home_key {
            continue;
        }
        let Ok(parsed) = Url::parse(&link.url) else {
            continue;
        };
        if !matches!(parsed.scheme(), "http" | "https") || host_of(&link.url) != site_host {
            continue;
        }

        let segments: Vec<String> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).map(|seg| seg.to_lowercase()).collect())
            .unwrap_or_default();
        if segments.is_empty() || !seen_paths.insert(segments.join("/")) {
            continue;
        }

        let mut node = &mut root;
        for segment in &segments {
            node = node.child_mut(segment);
        }
        let text = link.text.trim();
        if !text.is_empty() {
            node.label = text.to_string();
        }
    }

    let mut out = format!("{} (Homepage)\n", input.homepage.display_title());
    root.render(1, &mut out);
    out.trim_end().to_string()
}

fn titleize(segment: &str) -> String {
    let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
    stem.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemapper_scanner::RawLink;

    fn link(index: usize, text: &str, url: &str) -> LinkRecord {
        LinkRecord {
            index,
            text: text.to_string(),
            url: url.to_string(),
            source_pages: vec!["https://acme.test".to_string()],
            on_homepage: true,
        }
    }

    #[test]
    fn test_fallback_outline_keeps_root() {
        let outline = fallback_outline("Acme", "model unavailable");
        assert_eq!(outline, "Acme (Homepage)\n\t[error: model unavailable]");
    }

    #[test]
    fn test_validate_rejects_blank_sitemap() {
        let synthesis = Synthesis {
            sitemap: "  \n".to_string(),
            description: None,
        };
        assert!(matches!(synthesis.validate(), Err(JudgmentError::Malformed(_))));
    }

    #[test]
    fn test_titleize() {
        assert_eq!(titleize("case-studies"), "Case Studies");
        assert_eq!(titleize("about_us.html"), "About Us");
    }

    #[test]
    fn test_outline_by_path() {
        let homepage = PageRecord::new(
            "https://acme.test".to_string(),
            "Acme".to_string(),
            vec![RawLink::new("About", "/about")],
        );
        let links = vec![
            link(0, "About us", "https://acme.test/about"),
            link(1, "Post one", "https://www.acme.test/blog/post-one"),
            link(2, "Post one again", "https://acme.test/blog/post-one?ref=nav"),
            link(3, "Email", "mailto:hi@acme.test"),
            link(4, "fb", "https://facebook.com/acme"),
            link(5, "Elsewhere", "https://other.test/page"),
            link(6, "Home", "https://acme.test/"),
            link(7, "Team", "https://acme.test/about/team"),
        ];
        let pages = vec![homepage.clone()];
        let input = SynthesisInput {
            homepage: &homepage,
            links: &links,
            pages: &pages,
        };

        let outline = outline_by_path(&input);
        assert_eq!(
            outline,
            "Acme (Homepage)\n\tAbout us\n\t\tTeam\n\tBlog\n\t\tPost one"
        );
    }
}
