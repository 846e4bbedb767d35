// Tests for artifact writers

use skitter_engine::PageRecord;
use skitter_sink::{CsvSink, JsonSink, Sink, SinkConfig, SinkFormat, XlsxSink, persist_all, sink_for};
use std::fs;

fn sample_record(url: &str) -> PageRecord {
    let mut record = PageRecord::new(url.to_string());
    record.title = "Example Domain".to_string();
    record.content = "Example body text".to_string();
    record.links = vec![
        "https://example.test/a".to_string(),
        "https://example.test/b".to_string(),
    ];
    record.status = Some(200);
    record
}

fn failure_record(url: &str) -> PageRecord {
    let mut record = PageRecord::with_error(url.to_string(), "connection refused".to_string());
    record.status = None;
    record
}

// ============================================================================
// JSON Sink Tests
// ============================================================================

#[test]
fn test_json_sink_round_trips_records() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonSink::new(SinkConfig::new(dir.path()));

    let records = vec![
        sample_record("https://example.test/"),
        sample_record("https://example.test/about"),
    ];
    let path = sink.persist(&records).unwrap();

    let written: Vec<PageRecord> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].url, "https://example.test/");
    assert_eq!(written[1].links.len(), 2);
    assert_eq!(written[0].status, Some(200));
}

#[test]
fn test_json_sink_empty_records_is_valid_array() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonSink::new(SinkConfig::new(dir.path()));

    let path = sink.persist(&[]).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim(), "[]");
}

#[test]
fn test_json_sink_is_pretty_printed() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonSink::new(SinkConfig::new(dir.path()));

    let path = sink.persist(&[sample_record("https://example.test/")]).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.lines().count() > 1);
    assert!(content.contains("  \"url\""));
}

// ============================================================================
// CSV Sink Tests
// ============================================================================

#[test]
fn test_csv_sink_writes_header_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(SinkConfig::new(dir.path()));

    let records = vec![
        sample_record("https://example.test/"),
        sample_record("https://example.test/about"),
    ];
    let path = sink.persist(&records).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "url,title,content,links,fetched_at,status,error");
    assert!(lines[1].contains("https://example.test/a https://example.test/b"));
}

#[test]
fn test_csv_sink_empty_records_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(SinkConfig::new(dir.path()));

    let path = sink.persist(&[]).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["url,title,content,links,fetched_at,status,error"]);
}

#[test]
fn test_csv_sink_failure_row_keeps_error() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(SinkConfig::new(dir.path()));

    let path = sink.persist(&[failure_record("https://down.test/")]).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let row = content.lines().nth(1).unwrap();
    assert!(row.contains("connection refused"));
    assert!(row.starts_with("https://down.test/,,,,"));
}

// ============================================================================
// XLSX Sink Tests
// ============================================================================

#[test]
fn test_xlsx_sink_creates_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let sink = XlsxSink::new(SinkConfig::new(dir.path()));

    let path = sink.persist(&[sample_record("https://example.test/")]).unwrap();

    assert!(path.exists());
    assert!(fs::metadata(&path).unwrap().len() > 0);
    assert_eq!(path.extension().unwrap(), "xlsx");
}

#[test]
fn test_xlsx_sink_empty_records_still_saves() {
    let dir = tempfile::tempdir().unwrap();
    let sink = XlsxSink::new(SinkConfig::new(dir.path()));

    let path = sink.persist(&[]).unwrap();

    assert!(path.exists());
    assert!(fs::metadata(&path).unwrap().len() > 0);
}

// ============================================================================
// Naming and Config Tests
// ============================================================================

#[test]
fn test_artifact_name_has_prefix_stamp_extension() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonSink::new(SinkConfig::new(dir.path()));

    let path = sink.persist(&[]).unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("crawl_results_"));
    assert!(name.ends_with(".json"));
    // prefix + "_" + YYYYMMDD_HHMMSS
    let stem = path.file_stem().unwrap().to_str().unwrap();
    assert_eq!(stem.len(), "crawl_results".len() + 1 + 15);
}

#[test]
fn test_custom_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let config = SinkConfig::new(dir.path()).with_prefix("site");
    let sink = CsvSink::new(config);

    let path = sink.persist(&[]).unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("site_"));
}

#[test]
fn test_output_dir_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested").join("out");
    let sink = JsonSink::new(SinkConfig::new(&nested));

    let path = sink.persist(&[]).unwrap();

    assert!(nested.is_dir());
    assert!(path.starts_with(&nested));
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[test]
fn test_sink_for_builds_matching_writer() {
    let dir = tempfile::tempdir().unwrap();
    let sink = sink_for(SinkFormat::Csv, SinkConfig::new(dir.path()));

    let path = sink.persist(&[]).unwrap();

    assert_eq!(path.extension().unwrap(), "csv");
}

#[test]
fn test_persist_all_writes_each_format() {
    let dir = tempfile::tempdir().unwrap();
    let config = SinkConfig::new(dir.path());
    let formats = [SinkFormat::Json, SinkFormat::Csv, SinkFormat::Xlsx];

    let written = persist_all(&formats, &config, &[sample_record("https://example.test/")]).unwrap();

    assert_eq!(written.len(), 3);
    for (format, path) in &written {
        assert!(path.exists());
        assert_eq!(path.extension().unwrap().to_str().unwrap(), format.extension());
    }
}
