use thiserror::Error;

/// Typed failure for a single page fetch. Never fatal to a crawl.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network failure for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timed out fetching {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else if err.is_decode() {
            FetchError::Malformed {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: err,
            }
        }
    }

    /// True for failures where the page never answered (unreachable, timeout).
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network { .. } | FetchError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
