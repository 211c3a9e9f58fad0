//! Integration tests for CSV loading and the fallback policy.

use std::fs;
use std::path::Path;

use confluence_core::data::{DataError, MarketDataSource};
use confluence_core::domain::Timeframe;
use confluence_runner::{load_bars, CsvSource, DataOrigin, LoadError, LoadOptions};

const HEADER: &str = "timestamp,open,high,low,close,volume\n";

fn write_csv(dir: &Path, name: &str, rows: &[&str]) {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(dir.join(name), text).unwrap();
}

fn hourly_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            format!(
                "2024-02-01T{:02}:00:00Z,{},{},{},{},{}",
                i,
                close - 0.5,
                close + 1.0,
                close - 1.0,
                close,
                1000 + i
            )
        })
        .collect()
}

#[test]
fn csv_source_reads_named_file() {
    let dir = tempfile::tempdir().unwrap();
    let rows = hourly_rows(6);
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_csv(dir.path(), "BTC_1h.csv", &refs);

    let source = CsvSource::new(dir.path());
    assert_eq!(source.path_for("BTC", Timeframe::H1), dir.path().join("BTC_1h.csv"));
    let bars = source.get_bars("BTC", Timeframe::H1, 500).unwrap();
    assert_eq!(bars.len(), 6);
    assert_eq!(bars[0].close, 100.0);
    assert_eq!(bars[5].volume, 1005.0);
}

#[test]
fn csv_source_keeps_most_recent_period() {
    let dir = tempfile::tempdir().unwrap();
    let rows = hourly_rows(10);
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_csv(dir.path(), "ETH_1h.csv", &refs);

    let bars = CsvSource::new(dir.path()).get_bars("ETH", Timeframe::H1, 4).unwrap();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    assert_eq!(closes, vec![106.0, 107.0, 108.0, 109.0]);
}

#[test]
fn missing_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let err = CsvSource::new(dir.path())
        .get_bars("BTC", Timeframe::M5, 100)
        .unwrap_err();
    assert!(matches!(err, DataError::DataUnavailable { .. }));
}

#[test]
fn malformed_row_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "BTC_1h.csv",
        &["2024-02-01T00:00:00Z,100,101,99,100.5,1000", "yesterday,100,101,99,100.5,1000"],
    );
    let err = CsvSource::new(dir.path())
        .get_bars("BTC", Timeframe::H1, 100)
        .unwrap_err();
    match err {
        DataError::Parse(msg) => assert!(msg.contains(":3:")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn empty_file_fails_validation_in_loader() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "BTC_1h.csv", &[]);
    let source = CsvSource::new(dir.path());
    let err = load_bars("BTC", Timeframe::H1, Some(&source as &dyn MarketDataSource), &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, LoadError::Data(DataError::DataUnavailable { .. })));
}

#[test]
fn unordered_rows_fail_validation_in_loader() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "BTC_1h.csv",
        &[
            "2024-02-01T05:00:00Z,100,101,99,100.5,1000",
            "2024-02-01T04:00:00Z,100,101,99,100.5,1000",
        ],
    );
    let source = CsvSource::new(dir.path());
    let err = load_bars("BTC", Timeframe::H1, Some(&source as &dyn MarketDataSource), &LoadOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("time-ordered"));
}

#[test]
fn missing_csv_falls_back_to_synthetic_when_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let source = CsvSource::new(dir.path());
    let opts = LoadOptions {
        period: 64,
        synthetic: true,
    };
    let loaded = load_bars("DOGE", Timeframe::M15, Some(&source as &dyn MarketDataSource), &opts).unwrap();
    assert_eq!(loaded.origin, DataOrigin::Synthetic);
    assert_eq!(loaded.bars.len(), 64);
}

#[test]
fn csv_origin_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let rows = hourly_rows(5);
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_csv(dir.path(), "BTC_1h.csv", &refs);
    let source = CsvSource::new(dir.path());
    let loaded = load_bars("BTC", Timeframe::H1, Some(&source as &dyn MarketDataSource), &LoadOptions::default())
        .unwrap();
    assert_eq!(loaded.origin, DataOrigin::Source("csv".into()));
    assert!(!loaded.is_synthetic());
}
