//! Emitted-signal log.
//!
//! A `SignalStore` records actionable scalp signals for a session. Stores
//! suppress repeats: the same symbol, interval and action inside the
//! cooldown window is reported as a duplicate and not written.
//!
//! `JsonlSignalStore` persists one JSON object per line, making the log
//! resilient to partial writes and easy to stream.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use confluence_core::components::ScalpAction;
use confluence_core::domain::Timeframe;
use confluence_core::AnalysisReport;

/// One actionable signal as it was emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub symbol: String,
    pub interval: Timeframe,
    pub action: ScalpAction,
    pub confidence: f64,
    pub price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Timestamp of the bar the signal fired on.
    pub emitted_at: DateTime<Utc>,
}

impl SignalRecord {
    /// Build a record from a report's scalp signal. `None` for Hold.
    pub fn from_report(symbol: &str, report: &AnalysisReport) -> Option<Self> {
        let scalp = &report.scalp;
        if scalp.action == ScalpAction::Hold {
            return None;
        }
        Some(Self {
            symbol: symbol.to_string(),
            interval: report.timeframe,
            action: scalp.action,
            confidence: scalp.confidence,
            price: report.price,
            stop_loss: scalp.stop_loss,
            take_profit: scalp.take_profit_1,
            emitted_at: report.as_of,
        })
    }

    fn same_stream(&self, other: &SignalRecord) -> bool {
        self.symbol == other.symbol && self.interval == other.interval && self.action == other.action
    }
}

/// Caller-owned log of emitted signals.
pub trait SignalStore: Send {
    /// Record `signal` unless it repeats one inside the cooldown.
    ///
    /// Returns `Ok(true)` if written, `Ok(false)` if suppressed.
    fn record(&mut self, signal: SignalRecord) -> io::Result<bool>;

    /// Most recent signals for `symbol`, newest first.
    fn recent(&self, symbol: &str, limit: usize) -> Vec<SignalRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_duplicate(existing: &[SignalRecord], signal: &SignalRecord, cooldown: Duration) -> bool {
    existing
        .iter()
        .rev()
        .filter(|r| r.same_stream(signal))
        .any(|r| (signal.emitted_at - r.emitted_at).abs() < cooldown)
}

fn newest_for(records: &[SignalRecord], symbol: &str, limit: usize) -> Vec<SignalRecord> {
    records
        .iter()
        .rev()
        .filter(|r| r.symbol == symbol)
        .take(limit)
        .cloned()
        .collect()
}

/// Signal log held in memory for one session.
#[derive(Debug, Clone)]
pub struct InMemorySignalStore {
    records: Vec<SignalRecord>,
    cooldown: Duration,
}

impl InMemorySignalStore {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            records: Vec::new(),
            cooldown,
        }
    }

    pub fn records(&self) -> &[SignalRecord] {
        &self.records
    }
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

impl SignalStore for InMemorySignalStore {
    fn record(&mut self, signal: SignalRecord) -> io::Result<bool> {
        if is_duplicate(&self.records, &signal, self.cooldown) {
            return Ok(false);
        }
        self.records.push(signal);
        Ok(true)
    }

    fn recent(&self, symbol: &str, limit: usize) -> Vec<SignalRecord> {
        newest_for(&self.records, symbol, limit)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// JSONL-backed signal log. Existing lines are loaded on open so the
/// cooldown spans restarts.
pub struct JsonlSignalStore {
    path: PathBuf,
    cooldown: Duration,
    records: Vec<SignalRecord>,
}

impl JsonlSignalStore {
    pub fn open(path: PathBuf, cooldown: Duration) -> io::Result<Self> {
        let records = read_all(&path)?;
        Ok(Self {
            path,
            cooldown,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalStore for JsonlSignalStore {
    fn record(&mut self, signal: SignalRecord) -> io::Result<bool> {
        if is_duplicate(&self.records, &signal, self.cooldown) {
            return Ok(false);
        }

        let json = serde_json::to_string(&signal)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;

        self.records.push(signal);
        Ok(true)
    }

    fn recent(&self, symbol: &str, limit: usize) -> Vec<SignalRecord> {
        newest_for(&self.records, symbol, limit)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Read every well-formed record; malformed lines are skipped.
fn read_all(path: &Path) -> io::Result<Vec<SignalRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = io::BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<SignalRecord>(&line) {
            records.push(record);
        }
    }
    Ok(records)
}
