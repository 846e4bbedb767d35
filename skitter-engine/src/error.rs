use thiserror::Error;

/// Failure of a single fetch after the retry budget is spent.
///
/// Every variant is retryable inside the fetcher; once it reaches the
/// frontier the page is recorded as attempted-but-failed and the crawl
/// moves on.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Status code carried by the failure, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Malformed-document failure from an extractor. Never retried; the
/// frontier degrades the page to an empty record.
#[derive(Error, Debug, Clone)]
#[error("parse error: {0}")]
pub struct ParseError(pub String);

/// Errors that abort a crawl run before or outside the fetch loop.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[cfg(feature = "browser")]
    #[error("browser error: {0}")]
    Browser(String),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
