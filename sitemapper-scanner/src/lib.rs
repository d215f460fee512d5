pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod reader;
pub mod result;

pub use error::FetchError;
pub use fetcher::{HttpFetcher, PageFetcher};
pub use normalize::{NormalizedUrl, ensure_scheme, host_of, normalize_url, resolve_link};
pub use reader::ReaderFetcher;
pub use result::{PageRecord, RawLink};
