// Artifact writers for crawl records

use crate::error::Result;
use crate::format::SinkFormat;
use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};
use skitter_engine::PageRecord;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Column order shared by the tabular artifacts.
const COLUMNS: [&str; 7] = [
    "url",
    "title",
    "content",
    "links",
    "fetched_at",
    "status",
    "error",
];

/// Where artifacts land and what they are called. The final filename is
/// `<prefix>_<YYYYMMDD_HHMMSS>.<ext>`, so repeated runs never clobber
/// each other unless they finish within the same second.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub dir: PathBuf,
    pub prefix: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            prefix: "crawl_results".to_string(),
        }
    }
}

impl SinkConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Resolves the artifact path for `ext`, creating the output
    /// directory on demand.
    fn target(&self, ext: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        Ok(self.dir.join(format!("{}_{}.{}", self.prefix, stamp, ext)))
    }
}

/// Persists one finished crawl. Implementations must accept an empty
/// record slice and still produce a valid artifact.
pub trait Sink {
    fn persist(&self, records: &[PageRecord]) -> Result<PathBuf>;
}

/// Pretty-printed JSON array, one object per page.
pub struct JsonSink {
    config: SinkConfig,
}

impl JsonSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }
}

impl Sink for JsonSink {
    fn persist(&self, records: &[PageRecord]) -> Result<PathBuf> {
        let path = self.config.target(SinkFormat::Json.extension())?;
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&path, json)?;
        info!("wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

/// One row per page with a fixed header. Links are space separated so
/// the column stays a single cell.
pub struct CsvSink {
    config: SinkConfig,
}

impl CsvSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }
}

impl Sink for CsvSink {
    fn persist(&self, records: &[PageRecord]) -> Result<PathBuf> {
        let path = self.config.target(SinkFormat::Csv.extension())?;
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(COLUMNS)?;
        for record in records {
            let links = record.links.join(" ");
            let fetched_at = record.fetched_at.to_rfc3339();
            let status = record.status.map(|s| s.to_string()).unwrap_or_default();
            writer.write_record([
                record.url.as_str(),
                record.title.as_str(),
                record.content.as_str(),
                links.as_str(),
                fetched_at.as_str(),
                status.as_str(),
                record.error.as_deref().unwrap_or(""),
            ])?;
        }
        writer.flush()?;
        info!("wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

/// Single worksheet named `Sheet1` with a bold header row.
pub struct XlsxSink {
    config: SinkConfig,
}

impl XlsxSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }
}

impl Sink for XlsxSink {
    fn persist(&self, records: &[PageRecord]) -> Result<PathBuf> {
        let path = self.config.target(SinkFormat::Xlsx.extension())?;
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Sheet1")?;

        for (col, header) in COLUMNS.iter().enumerate() {
            worksheet.write_with_format(0, col as u16, *header, &bold)?;
        }

        for (row, record) in records.iter().enumerate() {
            let row = (row + 1) as u32;
            worksheet.write_string(row, 0, record.url.as_str())?;
            worksheet.write_string(row, 1, record.title.as_str())?;
            worksheet.write_string(row, 2, record.content.as_str())?;
            worksheet.write_string(row, 3, record.links.join(" "))?;
            worksheet.write_string(row, 4, record.fetched_at.to_rfc3339())?;
            if let Some(status) = record.status {
                worksheet.write_number(row, 5, status as f64)?;
            }
            worksheet.write_string(row, 6, record.error.as_deref().unwrap_or(""))?;
        }

        workbook.save(&path)?;
        info!("wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

/// Builds the writer for `format`.
pub fn sink_for(format: SinkFormat, config: SinkConfig) -> Box<dyn Sink> {
    match format {
        SinkFormat::Json => Box::new(JsonSink::new(config)),
        SinkFormat::Csv => Box::new(CsvSink::new(config)),
        SinkFormat::Xlsx => Box::new(XlsxSink::new(config)),
    }
}

/// Writes `records` once per requested format, returning the artifact
/// paths in the order the formats were asked for.
pub fn persist_all(
    formats: &[SinkFormat],
    config: &SinkConfig,
    records: &[PageRecord],
) -> Result<Vec<(SinkFormat, PathBuf)>> {
    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = sink_for(*format, config.clone()).persist(records)?;
        written.push((*format, path));
    }
    Ok(written)
}
