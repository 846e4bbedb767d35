use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One crawled page, as handed to the sinks.
///
/// A record is complete the moment it is built: either with extracted
/// content, or with empty content and the failure cause in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub links: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl PageRecord {
    pub fn new(url: String) -> Self {
        Self {
            url,
            title: String::new(),
            content: String::new(),
            links: Vec::new(),
            fetched_at: Utc::now(),
            status: None,
            error: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            url,
            title: String::new(),
            content: String::new(),
            links: Vec::new(),
            fetched_at: Utc::now(),
            status: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
