pub mod config;
pub mod crawl;
pub mod error;
pub mod llm;
pub mod outline;
pub mod policy;
pub mod registry;
pub mod report;
pub mod service;
pub mod synth;

pub use config::SitemapConfig;
pub use crawl::{CrawlOptions, CrawlOutcome, CrawlProgressCallback, Crawler};
pub use error::{CrawlError, JudgmentError};
pub use policy::{ExplorationPolicy, LinkJudge, SameSiteJudge};
pub use registry::{LinkRecord, LinkRegistry};
pub use report::ReportFormat;
pub use service::{SitemapRequest, SitemapResponse, SitemapService};
pub use synth::{PathSynthesizer, SitemapSynthesizer};
