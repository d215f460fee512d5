//! URL identity.
//!
//! Two links point at the same page when their [`NormalizedUrl`]s are equal.
//! Normalization is a pure string transform and never fails: malformed input
//! still produces a usable key.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Comparison key for a URL. Equality is always by this key, never by the
/// raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize a URL string into its comparison key.
///
/// Rules, in order: trim and lowercase, strip `http://` / `https://`, strip
/// one trailing `/`, strip a leading `www.`, strip any `#fragment`. The chain
/// is repeated until nothing changes so that `normalize_url` is idempotent
/// (`a.com/#x/` only settles after a second pass).
pub fn normalize_url(url: &str) -> NormalizedUrl {
    let mut current = url.trim().to_lowercase();
    loop {
        let next = apply_rules(&current);
        if next == current {
            return NormalizedUrl(next);
        }
        current = next;
    }
}

fn apply_rules(input: &str) -> String {
    let mut s = input.trim();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest;
            break;
        }
    }

    if let Some(rest) = s.strip_suffix('/') {
        s = rest;
    }

    if let Some(rest) = s.strip_prefix("www.") {
        s = rest;
    }

    if let Some(pos) = s.find('#') {
        s = &s[..pos];
    }

    s.to_string()
}

/// Prepend `https://` when the input carries no http(s) scheme.
pub fn ensure_scheme(url: &str) -> String {
    let trimmed = url.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Resolve an href found on `page_url` into an absolute URL.
///
/// Absolute hrefs (any scheme, including `mailto:`) are returned unchanged.
/// In-page `#anchors` are left as-is so the exploration policy can recognise
/// them. Anything that cannot be resolved comes back untouched.
pub fn resolve_link(page_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return href.to_string();
    }

    if Url::parse(href).is_ok() {
        return href.to_string();
    }

    Url::parse(&ensure_scheme(page_url))
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Host of a URL with any `www.` prefix removed, if it has one.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim())
        .or_else(|_| Url::parse(&ensure_scheme(url)))
        .ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}
