use sitemapper_scanner::FetchError;
use thiserror::Error;

/// Failure of an external judgment capability (link relevance or sitemap
/// synthesis). Always recoverable: callers fall back to a safe default.
#[derive(Error, Debug)]
pub enum JudgmentError {
    #[error("Judgment request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Judgment service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Judgment response was malformed: {0}")]
    Malformed(String),

    #[error("Judgment capability unavailable: {0}")]
    Unavailable(String),

    #[error("Judgment call timed out")]
    Timeout,
}

/// Everything that can go wrong upstream of a sitemap response.
///
/// None of these abort a crawl; they are collected and reported alongside
/// the (possibly degenerate) result.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Network failure: {0}")]
    NetworkFailure(FetchError),

    #[error("Malformed response: {0}")]
    MalformedResponse(FetchError),

    #[error("Judgment call failed: {0}")]
    JudgmentCallFailure(#[from] JudgmentError),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Crawl budget of {0:?} exhausted; results are partial")]
    BudgetExhausted(std::time::Duration),
}

impl From<FetchError> for CrawlError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Malformed { .. } | FetchError::InvalidUrl(_) => {
                CrawlError::MalformedResponse(err)
            }
            _ => CrawlError::NetworkFailure(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
