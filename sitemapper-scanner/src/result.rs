use serde::{Deserialize, Serialize};

/// An outbound link exactly as it was extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub text: String,
    pub url: String,
}

impl RawLink {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// A successfully fetched page. Created once per URL and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub links: Vec<RawLink>,
}

impl PageRecord {
    pub fn new(url: String, title: String, links: Vec<RawLink>) -> Self {
        Self { url, title, links }
    }

    /// Stand-in for a root page that could not be fetched.
    pub fn placeholder(url: String) -> Self {
        Self {
            title: url.clone(),
            url,
            links: Vec::new(),
        }
    }

    /// Title to show for this page, falling back to its URL.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            self.title.trim()
        }
    }
}

/// Drops links the registry should never see: empty targets and anchor text
/// carrying stray template braces.
pub fn retain_usable_links(links: Vec<RawLink>) -> Vec<RawLink> {
    links
        .into_iter()
        .filter(|link| !link.url.trim().is_empty())
        .filter(|link| !link.text.contains('{') && !link.text.contains('}'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_uses_url_as_title() {
        let page = PageRecord::placeholder("https://example.com".to_string());
        assert_eq!(page.title, "https://example.com");
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_display_title_falls_back_to_url() {
        let page = PageRecord::new("https://example.com".into(), "   ".into(), vec![]);
        assert_eq!(page.display_title(), "https://example.com");
    }

    #[test]
    fn test_retain_usable_links() {
        let links = vec![
            RawLink::new("About", "/about"),
            RawLink::new("Empty", "  "),
            RawLink::new("{{ item.title }}", "/template"),
            RawLink::new("Half}", "/broken"),
        ];
        let kept = retain_usable_links(links);
        assert_eq!(kept, vec![RawLink::new("About", "/about")]);
    }
}
