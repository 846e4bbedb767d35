// skitter-sink - persists crawl records as JSON, CSV or XLSX artifacts

pub mod error;
pub mod format;
pub mod summary;
pub mod writer;

pub use error::{Result, SinkError};
pub use format::{SinkFormat, parse_formats};
pub use summary::CrawlSummary;
pub use writer::{CsvSink, JsonSink, Sink, SinkConfig, XlsxSink, persist_all, sink_for};
