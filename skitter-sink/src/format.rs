// Output format selection

use crate::error::{Result, SinkError};
use std::fmt;

/// Artifact formats a finished crawl can be persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkFormat {
    Json,
    Csv,
    Xlsx,
}

impl SinkFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(SinkFormat::Json),
            "csv" => Some(SinkFormat::Csv),
            "xlsx" | "excel" => Some(SinkFormat::Xlsx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SinkFormat::Json => "json",
            SinkFormat::Csv => "csv",
            SinkFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for SinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SinkFormat::Json => "JSON",
            SinkFormat::Csv => "CSV",
            SinkFormat::Xlsx => "XLSX",
        };
        write!(f, "{label}")
    }
}

/// Parses a list of format names, deduplicating while keeping the
/// order the caller asked for.
pub fn parse_formats(names: &[String]) -> Result<Vec<SinkFormat>> {
    let mut formats = Vec::new();
    for name in names {
        let format = SinkFormat::from_str(name)
            .ok_or_else(|| SinkError::UnknownFormat(name.clone()))?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}
