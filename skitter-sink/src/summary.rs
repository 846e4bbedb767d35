// End-of-run summary rendering

use crate::format::SinkFormat;
use skitter_engine::PageRecord;
use std::path::PathBuf;
use std::time::Duration;

/// Accounting for one finished crawl, rendered after the artifacts are
/// on disk.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub pages: usize,
    pub failures: usize,
    pub total_links: usize,
    pub elapsed_secs: f64,
    pub artifacts: Vec<(SinkFormat, PathBuf)>,
}

impl CrawlSummary {
    pub fn from_records(records: &[PageRecord], elapsed: Duration) -> Self {
        Self {
            pages: records.len(),
            failures: records.iter().filter(|r| r.is_failure()).count(),
            total_links: records.iter().map(|r| r.links.len()).sum(),
            elapsed_secs: elapsed.as_secs_f64(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<(SinkFormat, PathBuf)>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Text block printed when a crawl finishes.
    pub fn render(&self) -> String {
        let mut report = String::new();

        report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        report.push_str("# Summary:\n");
        report.push_str(&format!("  Pages crawled: {}\n", self.pages));
        report.push_str(&format!("  Total links found: {}\n", self.total_links));
        if self.failures > 0 {
            report.push_str(&format!("  Failed pages: {}\n", self.failures));
        }
        report.push_str(&format!("  Elapsed: {:.1}s\n", self.elapsed_secs));

        if !self.artifacts.is_empty() {
            report.push_str("\n# Saved files:\n");
            for (format, path) in &self.artifacts {
                report.push_str(&format!("  {}: {}\n", format, path.display()));
            }
        }
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

        report
    }
}
