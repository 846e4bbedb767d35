use crate::error::{CrawlError, Result};
use crate::extract::{Extractor, HtmlExtractor};
use crate::fetch::Fetcher;
use crate::record::PageRecord;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_PAGES: usize = 10;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Decides whether a discovered link may join the queue.
pub type DomainPredicate = Arc<dyn Fn(&Url) -> bool + Send + Sync>;
/// Invoked once per emitted record, in emission order.
pub type RecordCallback = Arc<dyn Fn(&PageRecord) + Send + Sync>;

/// Lifecycle of one crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running,
    Draining,
    Completed,
}

/// One queued URL with its discovery provenance.
#[derive(Debug, Clone)]
struct FrontierEntry {
    url: String,
    discovered_from: Option<String>,
    depth: usize,
}

/// Queue and bookkeeping shared by the workers of one run.
struct Shared {
    queue: VecDeque<FrontierEntry>,
    /// URLs currently sitting in the queue.
    queued: HashSet<String>,
    /// URLs already dequeued for processing. Inserted at dequeue time so
    /// a URL is never fetched twice, even across workers.
    visited: HashSet<String>,
    /// Dequeues that consumed budget, successful or not.
    pages_attempted: usize,
    in_flight: usize,
}

impl Shared {
    fn seeded(seed: String) -> Self {
        let mut queued = HashSet::new();
        queued.insert(seed.clone());
        let mut queue = VecDeque::new();
        queue.push_back(FrontierEntry {
            url: seed,
            discovered_from: None,
            depth: 0,
        });
        Self {
            queue,
            queued,
            visited: HashSet::new(),
            pages_attempted: 0,
            in_flight: 0,
        }
    }
}

/// The traversal engine: breadth-first over same-origin links, bounded
/// by a page budget, pausing between fetches for politeness.
///
/// All crawl state lives inside one `run` call; a `Frontier` can be
/// reused for independent runs. With `workers = 1` the crawl is
/// sequential and records come out in breadth-first discovery order.
/// With more workers records are emitted in fetch-completion order,
/// which is not deterministic.
pub struct Frontier {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    max_pages: usize,
    delay: Duration,
    workers: usize,
    domain_predicate: Option<DomainPredicate>,
    record_callback: Option<RecordCallback>,
    cancel: CancellationToken,
    state: Arc<Mutex<CrawlState>>,
}

impl Frontier {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            extractor: Arc::new(HtmlExtractor),
            max_pages: DEFAULT_MAX_PAGES,
            delay: DEFAULT_DELAY,
            workers: 1,
            domain_predicate: None,
            record_callback: None,
            cancel: CancellationToken::new(),
            state: Arc::new(Mutex::new(CrawlState::Idle)),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Replaces the default same-origin rule.
    pub fn with_domain_predicate(mut self, predicate: DomainPredicate) -> Self {
        self.domain_predicate = Some(predicate);
        self
    }

    pub fn with_record_callback(mut self, callback: RecordCallback) -> Self {
        self.record_callback = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn state(&self) -> CrawlState {
        *self.state.lock().await
    }

    /// Crawls from `seed_url` until the queue drains, the page budget is
    /// spent, or the run is cancelled. Returns every record emitted.
    ///
    /// Only an unusable seed or a failed worker task abort the run; fetch
    /// and parse failures are recorded and crawling continues.
    pub async fn run(&self, seed_url: &str) -> Result<Vec<PageRecord>> {
        let seed = parse_seed(seed_url)?;
        let predicate = self
            .domain_predicate
            .clone()
            .unwrap_or_else(|| same_origin(&seed));

        let workers = self.workers;
        info!(
            "starting crawl of {} ({} workers, budget {} pages)",
            seed, workers, self.max_pages
        );
        *self.state.lock().await = CrawlState::Running;

        let shared = Arc::new(Mutex::new(Shared::seeded(seed.to_string())));
        let records: Arc<Mutex<Vec<PageRecord>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for worker_id in 0..workers {
            let fetcher = self.fetcher.clone();
            let extractor = self.extractor.clone();
            let predicate = predicate.clone();
            let callback = self.record_callback.clone();
            let cancel = self.cancel.clone();
            let crawl_state = self.state.clone();
            let shared = shared.clone();
            let records = records.clone();
            let max_pages = self.max_pages;
            let delay = self.delay;

            let handle = tokio::spawn(async move {
                debug!("worker {} started", worker_id);

                loop {
                    if cancel.is_cancelled() {
                        *crawl_state.lock().await = CrawlState::Draining;
                        break;
                    }

                    // Dequeue under the lock; budget and identity are
                    // reserved there so no peer can double-spend either.
                    let (entry, page_no) = {
                        let mut shared = shared.lock().await;
                        if shared.pages_attempted >= max_pages {
                            break;
                        }
                        match shared.queue.pop_front() {
                            Some(entry) => {
                                shared.queued.remove(&entry.url);
                                if shared.visited.contains(&entry.url) {
                                    // Stale duplicate: no budget, no delay.
                                    debug!("skipping already-visited {}", entry.url);
                                    continue;
                                }
                                shared.visited.insert(entry.url.clone());
                                shared.pages_attempted += 1;
                                shared.in_flight += 1;
                                (entry, shared.pages_attempted)
                            }
                            None => {
                                if shared.in_flight == 0 {
                                    break;
                                }
                                drop(shared);
                                // A peer may still discover links; poll.
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                continue;
                            }
                        }
                    };

                    match entry.discovered_from {
                        Some(ref via) => info!(
                            "crawling ({}/{}) {} (via {})",
                            page_no, max_pages, entry.url, via
                        ),
                        None => info!("crawling ({}/{}) {}", page_no, max_pages, entry.url),
                    }

                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => None,
                        record = Self::fetch_and_extract(&fetcher, &extractor, &entry.url) => {
                            Some(record)
                        }
                    };

                    let Some(record) = outcome else {
                        // Cancelled mid-fetch: the page is dropped without
                        // a record.
                        shared.lock().await.in_flight -= 1;
                        *crawl_state.lock().await = CrawlState::Draining;
                        debug!("worker {} abandoned in-flight {}", worker_id, entry.url);
                        break;
                    };

                    let more_work = {
                        let mut shared = shared.lock().await;
                        for candidate in &record.links {
                            let Ok(parsed) = Url::parse(candidate) else {
                                debug!("discarding unparseable link {}", candidate);
                                continue;
                            };
                            // Domain rule comes first so off-domain pages
                            // never consume queue bookkeeping.
                            if !predicate(&parsed) {
                                debug!("off-domain link {} not enqueued", candidate);
                                continue;
                            }
                            if shared.visited.contains(candidate)
                                || shared.queued.contains(candidate)
                            {
                                continue;
                            }
                            debug!("queueing {} (depth {})", candidate, entry.depth + 1);
                            shared.queued.insert(candidate.clone());
                            shared.queue.push_back(FrontierEntry {
                                url: candidate.clone(),
                                discovered_from: Some(entry.url.clone()),
                                depth: entry.depth + 1,
                            });
                        }
                        shared.in_flight -= 1;
                        (!shared.queue.is_empty() || shared.in_flight > 0)
                            && shared.pages_attempted < max_pages
                    };

                    records.lock().await.push(record.clone());
                    if let Some(ref callback) = callback {
                        callback(&record);
                    }

                    if more_work && !cancel.is_cancelled() {
                        debug!(
                            "worker {} pausing {:.1}s",
                            worker_id,
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                    }
                }

                debug!("worker {} finished", worker_id);
            });

            handles.push(handle);
        }

        for handle in handles {
            handle.await?;
        }

        *self.state.lock().await = CrawlState::Completed;

        let collected = records.lock().await.clone();
        info!("crawl complete: {} pages", collected.len());
        Ok(collected)
    }

    /// Runs one fetch and extraction outside any lock; used by the
    /// worker tasks, which cannot borrow `&self`.
    async fn fetch_and_extract(
        fetcher: &Arc<dyn Fetcher>,
        extractor: &Arc<dyn Extractor>,
        url: &str,
    ) -> PageRecord {
        match fetcher.fetch(url).await {
            Ok(success) => {
                let mut record = PageRecord::new(url.to_string());
                record.status = Some(success.status);
                match extractor.extract(&success.body, &success.final_url) {
                    Ok(extraction) => {
                        record.title = extraction.title;
                        record.content = extraction.content;
                        record.links = extraction.links;
                    }
                    Err(parse_err) => {
                        warn!("extraction failed for {}: {}", url, parse_err);
                        record.error = Some(parse_err.to_string());
                    }
                }
                record
            }
            Err(fetch_err) => {
                warn!("treating {} as an empty page: {}", url, fetch_err);
                let mut record = PageRecord::with_error(url.to_string(), fetch_err.to_string());
                record.status = fetch_err.status();
                record
            }
        }
    }
}

fn parse_seed(seed_url: &str) -> Result<Url> {
    let mut seed = Url::parse(seed_url)
        .map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", seed_url, e)))?;
    if seed.host_str().is_none() {
        return Err(CrawlError::InvalidUrl(format!(
            "{} has no host",
            seed_url
        )));
    }
    seed.set_fragment(None);
    Ok(seed)
}

/// Default traversal rule: the candidate's origin must equal the seed's.
fn same_origin(seed: &Url) -> DomainPredicate {
    let origin = seed.origin();
    Arc::new(move |candidate: &Url| candidate.origin() == origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::extract::Extraction;
    use crate::fetch::{HttpFetcher, RetryPolicy, DEFAULT_USER_AGENT};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn quick_fetcher() -> Arc<HttpFetcher> {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
        };
        Arc::new(HttpFetcher::with_retry(DEFAULT_USER_AGENT, 5, policy).unwrap())
    }

    fn frontier() -> Frontier {
        Frontier::new(quick_fetcher()).with_delay(Duration::ZERO)
    }

    fn page_html(base: &str, paths: &[&str]) -> String {
        let mut html = String::from("<html><head><title>page</title></head><body><p>text</p>");
        for p in paths {
            html.push_str(&format!(r#"<a href="{}{}">link</a>"#, base, p));
        }
        html.push_str("</body></html>");
        html
    }

    async fn mount_page(server: &MockServer, at: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html),
            )
            .mount(server)
            .await;
    }

    fn urls(records: &[PageRecord]) -> Vec<String> {
        records.iter().map(|r| r.url.clone()).collect()
    }

    #[tokio::test]
    async fn test_breadth_first_order() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page_html(&base, &["/a", "/b", "/c"])).await;
        mount_page(&server, "/a", page_html(&base, &[])).await;
        mount_page(&server, "/b", page_html(&base, &[])).await;
        mount_page(&server, "/c", page_html(&base, &[])).await;

        let frontier = frontier();
        assert_eq!(frontier.state().await, CrawlState::Idle);

        let records = frontier.run(&format!("{}/", base)).await.unwrap();

        assert_eq!(
            urls(&records),
            vec![
                format!("{}/", base),
                format!("{}/a", base),
                format!("{}/b", base),
                format!("{}/c", base),
            ]
        );
        assert_eq!(frontier.state().await, CrawlState::Completed);
    }

    #[tokio::test]
    async fn test_page_budget_counts_failed_fetches() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page_html(&base, &["/missing", "/ok"])).await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_page(&server, "/ok", page_html(&base, &[])).await;

        let records = frontier()
            .with_max_pages(3)
            .run(&format!("{}/", base))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        let failed = &records[1];
        assert_eq!(failed.url, format!("{}/missing", base));
        assert!(failed.is_failure());
        assert_eq!(failed.status, Some(404));
        assert!(failed.links.is_empty());
        assert_eq!(records[2].url, format!("{}/ok", base));
    }

    #[tokio::test]
    async fn test_max_pages_one_leaves_queue_unfetched() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(
            &server,
            "/",
            page_html(&base, &["/p1", "/p2", "/p3", "/p4", "/p5"]),
        )
        .await;
        for p in ["/p1", "/p2", "/p3", "/p4", "/p5"] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;
        }

        let records = frontier()
            .with_max_pages(1)
            .run(&format!("{}/", base))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].links.len(), 5);
    }

    #[tokio::test]
    async fn test_off_domain_links_never_fetched() {
        let server = MockServer::start().await;
        let base = server.uri();

        let html = format!(
            r#"<html><body>
                <a href="{}/local">local</a>
                <a href="https://other.test/x">away</a>
            </body></html>"#,
            base
        );
        mount_page(&server, "/", html).await;
        mount_page(&server, "/local", page_html(&base, &[])).await;

        let records = frontier().run(&format!("{}/", base)).await.unwrap();

        assert_eq!(
            urls(&records),
            vec![format!("{}/", base), format!("{}/local", base)]
        );
        // The record still lists the off-domain link; it was discovered,
        // just never followed.
        assert!(records[0]
            .links
            .contains(&"https://other.test/x".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_and_cyclic_links_fetched_once() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page_html(&base, &["/a", "/a", "/a"])).await;
        mount_page(&server, "/a", page_html(&base, &["/"])).await;

        let records = frontier().run(&format!("{}/", base)).await.unwrap();

        let crawled = urls(&records);
        assert_eq!(crawled, vec![format!("{}/", base), format!("{}/a", base)]);
        let unique: HashSet<_> = crawled.iter().collect();
        assert_eq!(unique.len(), crawled.len());
    }

    #[tokio::test]
    async fn test_same_mock_site_crawls_identically() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page_html(&base, &["/x", "/y"])).await;
        mount_page(&server, "/x", page_html(&base, &["/y", "/z"])).await;
        mount_page(&server, "/y", page_html(&base, &[])).await;
        mount_page(&server, "/z", page_html(&base, &[])).await;

        let first = frontier().run(&format!("{}/", base)).await.unwrap();
        let second = frontier().run(&format!("{}/", base)).await.unwrap();

        assert_eq!(urls(&first), urls(&second));
    }

    #[tokio::test]
    async fn test_seed_fetch_failure_yields_failure_record() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let records = frontier()
            .with_max_pages(1)
            .run(&format!("{}/", server.uri()))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].is_failure());
        assert!(records[0].content.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_seed_aborts_before_running() {
        let frontier = frontier();
        let result = frontier.run("not a url").await;

        assert!(matches!(result, Err(CrawlError::InvalidUrl(_))));
        assert_eq!(frontier.state().await, CrawlState::Idle);
    }

    #[tokio::test]
    async fn test_extractor_failure_degrades_to_empty_record() {
        struct Refusing;
        impl Extractor for Refusing {
            fn extract(
                &self,
                _body: &str,
                _base_url: &str,
            ) -> std::result::Result<Extraction, ParseError> {
                Err(ParseError("boom".to_string()))
            }
        }

        let server = MockServer::start().await;
        let base = server.uri();
        mount_page(&server, "/", page_html(&base, &["/a"])).await;

        let records = frontier()
            .with_extractor(Arc::new(Refusing))
            .run(&format!("{}/", base))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Some(200));
        assert!(records[0].content.is_empty());
        assert!(records[0].links.is_empty());
        assert!(records[0].error.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_dequeuing() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page_html(&base, &["/a", "/b", "/c"])).await;
        for p in ["/a", "/b", "/c"] {
            mount_page(&server, p, page_html(&base, &[])).await;
        }

        let token = CancellationToken::new();
        let cancel_after_first = token.clone();
        let frontier = frontier()
            .with_cancellation(token)
            .with_record_callback(Arc::new(move |_record| {
                cancel_after_first.cancel();
            }));

        let records = frontier.run(&format!("{}/", base)).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(frontier.state().await, CrawlState::Completed);
    }

    #[tokio::test]
    async fn test_worker_pool_visits_everything_once() {
        let server = MockServer::start().await;
        let base = server.uri();

        let leaves: Vec<String> = (1..=10).map(|i| format!("/page{}", i)).collect();
        let leaf_refs: Vec<&str> = leaves.iter().map(|s| s.as_str()).collect();
        mount_page(&server, "/", page_html(&base, &leaf_refs)).await;
        for leaf in &leaves {
            mount_page(&server, leaf, page_html(&base, &[])).await;
        }

        let counted = Arc::new(AtomicUsize::new(0));
        let counter = counted.clone();
        let records = frontier()
            .with_workers(4)
            .with_max_pages(20)
            .with_record_callback(Arc::new(move |_record| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .run(&format!("{}/", base))
            .await
            .unwrap();

        println!("pool crawl emitted {} records", records.len());
        assert_eq!(records.len(), 11);
        assert_eq!(counted.load(Ordering::SeqCst), 11);

        // Completion order may vary across workers; the visited set may not.
        let crawled: HashSet<String> = urls(&records).into_iter().collect();
        assert_eq!(crawled.len(), 11);
        for leaf in &leaves {
            assert!(crawled.contains(&format!("{}{}", base, leaf)));
        }
    }

    #[tokio::test]
    async fn test_politeness_delay_between_fetches() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/", page_html(&base, &["/a", "/b"])).await;
        mount_page(&server, "/a", page_html(&base, &[])).await;
        mount_page(&server, "/b", page_html(&base, &[])).await;

        let start = Instant::now();
        let records = Frontier::new(quick_fetcher())
            .with_delay(Duration::from_millis(150))
            .run(&format!("{}/", base))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        // Two pauses: after the seed and after /a. None after the last page.
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_seed_fragment_stripped() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount_page(&server, "/", page_html(&base, &[])).await;

        let records = frontier()
            .run(&format!("{}/#intro", base))
            .await
            .unwrap();

        assert_eq!(records[0].url, format!("{}/", base));
    }
}
