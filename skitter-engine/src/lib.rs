#[cfg(feature = "browser")]
pub mod browser;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod record;

#[cfg(feature = "browser")]
pub use browser::{BrowserFetcher, BrowserOptions};
pub use error::{CrawlError, FetchError, ParseError, Result};
pub use extract::{Extraction, Extractor, HtmlExtractor};
pub use fetch::{FetchResult, FetchSuccess, Fetcher, HttpFetcher, RetryPolicy, DEFAULT_USER_AGENT};
pub use frontier::{CrawlState, DomainPredicate, Frontier, RecordCallback};
pub use record::PageRecord;
