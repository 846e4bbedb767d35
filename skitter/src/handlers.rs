use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use skitter_engine::{DEFAULT_USER_AGENT, Fetcher, Frontier, HttpFetcher, PageRecord};
use skitter_sink::{CrawlSummary, SinkConfig, parse_formats, persist_all};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

#[cfg(feature = "browser")]
use skitter_engine::{BrowserFetcher, BrowserOptions};
#[cfg(feature = "browser")]
use tracing::warn;

// Helper functions for crawl handler

/// Parse the seed argument as a URL, trying to add http:// if needed
pub fn parse_seed_url(raw: &str) -> Option<String> {
    if let Ok(url) = Url::parse(raw)
        && url.host_str().is_some()
    {
        return Some(url.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", raw);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.host_str().is_some()
    {
        return Some(url.to_string());
    }

    None
}

/// Path component shown next to the progress spinner
pub fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

/// Everything `execute_crawl` needs beyond the fetcher.
pub struct CrawlSettings {
    pub seed: String,
    pub delay: Duration,
    pub max_pages: usize,
    pub workers: usize,
    pub show_progress: bool,
}

/// Runs the frontier with a progress spinner and Ctrl-C draining wired in.
pub async fn execute_crawl(
    fetcher: Arc<dyn Fetcher>,
    settings: &CrawlSettings,
    cancel: CancellationToken,
) -> skitter_engine::Result<Vec<PageRecord>> {
    let spinner = if settings.show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("starting crawl...");
        Some(pb)
    } else {
        None
    };

    let mut frontier = Frontier::new(fetcher)
        .with_max_pages(settings.max_pages)
        .with_delay(settings.delay)
        .with_workers(settings.workers)
        .with_cancellation(cancel.clone());

    if let Some(ref pb) = spinner {
        let pb = pb.clone();
        let processed = Arc::new(AtomicUsize::new(0));
        let max_pages = settings.max_pages;
        frontier = frontier.with_record_callback(Arc::new(move |record: &PageRecord| {
            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            pb.set_message(format!("({}/{}) {}", done, max_pages, url_path(&record.url)));
        }));
    }

    // A first Ctrl-C drains in-flight pages instead of killing the process.
    let ctrl_c_cancel = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Interrupt received, finishing in-flight pages...",
                "⚠".yellow().bold()
            );
            ctrl_c_cancel.cancel();
        }
    });

    let result = frontier.run(&settings.seed).await;
    ctrl_c.abort();

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    result
}

pub async fn handle_crawl(sub_matches: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let raw_seed = sub_matches.get_one::<String>("URL").unwrap();
    let delay = *sub_matches.get_one::<f64>("delay").unwrap_or(&1.0);
    let max_pages = *sub_matches.get_one::<usize>("max-pages").unwrap_or(&10);
    let workers = *sub_matches.get_one::<usize>("workers").unwrap_or(&1);
    let timeout = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);
    let quiet = sub_matches.get_flag("quiet");
    let browser = sub_matches.get_flag("browser");
    let wait_for = sub_matches.get_one::<String>("wait-for").cloned();
    let headless = !sub_matches.get_flag("no-headless");
    let user_agent = sub_matches
        .get_one::<String>("user-agent")
        .map(String::as_str)
        .unwrap_or(DEFAULT_USER_AGENT);
    let format_names: Vec<String> = sub_matches
        .get_many::<String>("formats")
        .unwrap_or_default()
        .cloned()
        .collect();
    let output_dir = sub_matches.get_one::<String>("output-dir").unwrap();

    let Some(seed) = parse_seed_url(raw_seed) else {
        eprintln!("{} Invalid seed URL '{}'", "✗".red().bold(), raw_seed);
        eprintln!("Pages crawled: 0");
        std::process::exit(1);
    };

    let formats = match parse_formats(&format_names) {
        Ok(formats) => formats,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let expanded_dir = shellexpand::tilde(output_dir);
    let sink_config = SinkConfig::new(PathBuf::from(expanded_dir.as_ref()));

    if !quiet {
        println!("\n🕷️  Crawling {}", seed);
        println!("Workers: {}", workers);
        println!("Max pages: {}", max_pages);
        println!("Delay: {}s", delay);
        if browser {
            println!(
                "Transport: {}",
                if headless { "headless browser" } else { "browser window" }
            );
        }
        let format_list: Vec<String> = formats.iter().map(|f| f.to_string()).collect();
        println!("Formats: {}\n", format_list.join(", "));
    }

    let settings = CrawlSettings {
        seed,
        delay: Duration::from_secs_f64(delay.max(0.0)),
        max_pages,
        workers,
        show_progress: !quiet,
    };
    let cancel = CancellationToken::new();
    let started = Instant::now();

    let outcome = if browser {
        crawl_with_browser(&settings, cancel.clone(), timeout, wait_for, headless).await
    } else {
        let fetcher = match HttpFetcher::new(user_agent, timeout) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                eprintln!("{} {}", "✗".red().bold(), e);
                eprintln!("Pages crawled: 0");
                std::process::exit(1);
            }
        };
        execute_crawl(Arc::new(fetcher), &settings, cancel.clone()).await
    };

    let records = match outcome {
        Ok(records) => records,
        Err(e) => {
            eprintln!("{} Crawl failed: {}", "✗".red().bold(), e);
            eprintln!("Pages crawled: 0");
            std::process::exit(1);
        }
    };
    let elapsed = started.elapsed();

    if cancel.is_cancelled() {
        println!(
            "\n{} Crawl interrupted, saving what was fetched",
            "⚠".yellow().bold()
        );
    } else if !quiet {
        println!("\n{} Crawl complete!", "✓".green().bold());
    }

    let artifacts = match persist_all(&formats, &sink_config, &records) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            eprintln!("{} Failed to save results: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let summary = CrawlSummary::from_records(&records, elapsed).with_artifacts(artifacts);
    print!("{}", summary.render());
}

#[cfg(feature = "browser")]
async fn crawl_with_browser(
    settings: &CrawlSettings,
    cancel: CancellationToken,
    timeout: u64,
    wait_for: Option<String>,
    headless: bool,
) -> skitter_engine::Result<Vec<PageRecord>> {
    let options = BrowserOptions {
        headless,
        page_timeout: Duration::from_secs(timeout),
        wait_for,
        ..BrowserOptions::default()
    };
    let fetcher = Arc::new(BrowserFetcher::launch(options).await?);
    let result = execute_crawl(fetcher.clone(), settings, cancel).await;

    // The frontier is gone by now, so this is the last handle.
    match Arc::try_unwrap(fetcher) {
        Ok(fetcher) => {
            if let Err(e) = fetcher.close().await {
                warn!("browser shutdown failed: {}", e);
            }
        }
        Err(_) => warn!("browser still referenced at shutdown"),
    }

    result
}

#[cfg(not(feature = "browser"))]
async fn crawl_with_browser(
    _settings: &CrawlSettings,
    _cancel: CancellationToken,
    _timeout: u64,
    _wait_for: Option<String>,
    _headless: bool,
) -> skitter_engine::Result<Vec<PageRecord>> {
    eprintln!(
        "{} This build has no browser support; rebuild with --features browser",
        "✗".red().bold()
    );
    std::process::exit(1)
}
