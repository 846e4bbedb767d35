use crate::error::{CrawlError, FetchError, Result};
use crate::fetch::{FetchResult, FetchSuccess, Fetcher, RetryPolicy};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Rendering knobs for the browser transport.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Navigation deadline, also the deadline for `wait_for`.
    pub page_timeout: Duration,
    /// CSS selector to poll for before capturing the DOM. Timing out
    /// here only logs; the page is still captured.
    pub wait_for: Option<String>,
    /// Pause after navigation so scripts can fill the DOM in.
    pub settle: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            page_timeout: Duration::from_secs(10),
            wait_for: None,
            settle: Duration::from_secs(2),
        }
    }
}

/// Fetcher variant that renders pages in a headless Chromium before
/// handing the DOM back. Interchangeable with the HTTP transport from
/// the frontier's point of view, retries included.
pub struct BrowserFetcher {
    browser: Browser,
    handler_task: JoinHandle<()>,
    retry: RetryPolicy,
    options: BrowserOptions,
}

impl BrowserFetcher {
    pub async fn launch(options: BrowserOptions) -> Result<Self> {
        Self::launch_with_retry(options, RetryPolicy::default()).await
    }

    pub async fn launch_with_retry(options: BrowserOptions, retry: RetryPolicy) -> Result<Self> {
        let builder = BrowserConfig::builder();
        let builder = if options.headless {
            builder
        } else {
            builder.with_head()
        };
        let config = builder.build().map_err(CrawlError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::Browser(e.to_string()))?;

        // The CDP connection only makes progress while its handler
        // stream is polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            retry,
            options,
        })
    }

    /// Shuts the browser process down. Prefer calling this over letting
    /// the fetcher drop, which leaves teardown to the child process.
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| CrawlError::Browser(e.to_string()))?;
        self.browser
            .wait()
            .await
            .map_err(|e| CrawlError::Browser(e.to_string()))?;
        self.handler_task.abort();
        Ok(())
    }

    async fn attempt(&self, url: &str) -> FetchResult {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| transport(url, e))?;

        let result = self.render(&page, url).await;

        if let Err(e) = page.close().await {
            warn!("failed to close page for {}: {}", url, e);
        }

        result
    }

    async fn render(&self, page: &Page, url: &str) -> FetchResult {
        tokio::time::timeout(self.options.page_timeout, page.goto(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| transport(url, e))?;

        if let Some(ref selector) = self.options.wait_for {
            self.wait_for_selector(page, url, selector).await;
        }

        tokio::time::sleep(self.options.settle).await;

        let body = page.content().await.map_err(|e| transport(url, e))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        // The renderer does not surface the HTTP status; a completed
        // navigation counts as success.
        Ok(FetchSuccess {
            body,
            final_url,
            status: 200,
        })
    }

    async fn wait_for_selector(&self, page: &Page, url: &str, selector: &str) {
        let deadline = Instant::now() + self.options.page_timeout;
        loop {
            if page.find_element(selector).await.is_ok() {
                return;
            }
            if Instant::now() >= deadline {
                warn!("timed out waiting for '{}' on {}", selector, url);
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                "rendering {} (attempt {}/{})",
                url, attempt, self.retry.max_attempts
            );

            match self.attempt(url).await {
                Ok(success) => return Ok(success),
                Err(err) if attempt < self.retry.max_attempts => {
                    let wait = self.retry.backoff();
                    warn!(
                        "render attempt {}/{} failed for {}: {} (retrying in {:.1}s)",
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

fn transport(url: &str, err: impl std::fmt::Display) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}
