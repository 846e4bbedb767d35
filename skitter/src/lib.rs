// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    CrawlSettings,
    execute_crawl,
    parse_seed_url,
    url_path,
};
