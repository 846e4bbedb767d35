use crate::error::{CrawlError, FetchError, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Sent when the caller does not supply a user agent of their own.
pub const DEFAULT_USER_AGENT: &str = "skitter/0.1";

/// A retrieved document: body, resolved URL after redirects, status.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub body: String,
    pub final_url: String,
    pub status: u16,
}

pub type FetchResult = std::result::Result<FetchSuccess, FetchError>;

/// A single-URL retrieval backend.
///
/// Implementations retry internally per their [`RetryPolicy`] and return
/// the last failure once the attempt budget is spent. They hold no crawl
/// state; the frontier owns all of that.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Bounded retry with a uniform random pause between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least one attempt is
    /// always made.
    pub max_attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Draws one backoff duration uniformly from the configured range.
    pub(crate) fn backoff(&self) -> Duration {
        let min = self.backoff_min.as_secs_f64();
        let max = self.backoff_max.as_secs_f64();
        if max <= min {
            return self.backoff_min;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(min..max))
    }
}

/// Lightweight HTTP transport backed by a pooled reqwest client.
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        Self::with_retry(user_agent, timeout_secs, RetryPolicy::default())
    }

    pub fn with_retry(user_agent: &str, timeout_secs: u64, retry: RetryPolicy) -> Result<Self> {
        if user_agent.trim().is_empty() {
            return Err(CrawlError::Config(
                "user agent must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, retry })
    }

    async fn attempt(&self, url: &str) -> FetchResult {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        Ok(FetchSuccess {
            body,
            final_url,
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("fetching {} (attempt {}/{})", url, attempt, self.retry.max_attempts);

            match self.attempt(url).await {
                Ok(success) => {
                    debug!("fetched {} ({})", success.final_url, success.status);
                    return Ok(success);
                }
                Err(err) if attempt < self.retry.max_attempts => {
                    let wait = self.retry.backoff();
                    warn!(
                        "attempt {}/{} failed for {}: {} (retrying in {:.1}s)",
                        attempt,
                        self.retry.max_attempts,
                        url,
                        err,
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    warn!("giving up on {} after {} attempts: {}", url, attempt, err);
                    return Err(err);
                }
            }
        }
    }
}
