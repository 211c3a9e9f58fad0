//! Bar loading and data resolution for the runner.
//!
//! Implements the fallback policy:
//! 1. If a data source is configured and returns valid bars → use them
//! 2. If not, and `synthetic` is set → generate synthetic bars (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Synthetic data is a developer-only debug mode. Signals produced on
//! synthetic data are tagged through `LoadedData::origin`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use confluence_core::data::{validate_bars, DataError, MarketDataSource};
use confluence_core::domain::{Bar, Timeframe};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data source for '{symbol}' {interval} (use --synthetic for synthetic data)")]
    NoSource { symbol: String, interval: Timeframe },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Most recent bars to request.
    pub period: usize,
    /// Generate synthetic bars when real data is unavailable.
    pub synthetic: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            period: 500,
            synthetic: false,
        }
    }
}

/// Where a bar sequence came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataOrigin {
    Source(String),
    Synthetic,
}

/// Result of loading bars, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    pub origin: DataOrigin,
    /// BLAKE3 over every bar, for tagging results.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn is_synthetic(&self) -> bool {
        self.origin == DataOrigin::Synthetic
    }
}

/// A data source plus the fallback policy, shared by every load in a run.
#[derive(Clone, Copy)]
pub struct DataLoader<'a> {
    source: Option<&'a dyn MarketDataSource>,
    options: LoadOptions,
}

impl<'a> DataLoader<'a> {
    pub fn new(source: Option<&'a dyn MarketDataSource>, options: LoadOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    pub fn load(&self, symbol: &str, interval: Timeframe) -> Result<LoadedData, LoadError> {
        load_bars(symbol, interval, self.source, &self.options)
    }
}

/// Load bars for one symbol and interval, with fallback to synthetic data.
pub fn load_bars(
    symbol: &str,
    interval: Timeframe,
    source: Option<&dyn MarketDataSource>,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let mut failure = None;

    if let Some(src) = source {
        match src
            .get_bars(symbol, interval, opts.period)
            .and_then(|bars| validate_bars(symbol, interval, bars))
        {
            Ok(bars) => {
                debug!(symbol, %interval, source = src.name(), bars = bars.len(), "loaded bars");
                return Ok(LoadedData {
                    dataset_hash: compute_dataset_hash(&bars),
                    bars,
                    origin: DataOrigin::Source(src.name().to_string()),
                });
            }
            Err(e) => failure = Some(e),
        }
    }

    if opts.synthetic {
        warn!(
            symbol,
            %interval,
            reason = ?failure,
            "generating synthetic data; results will be tagged as synthetic"
        );
        let bars = SyntheticSource::default().get_bars(symbol, interval, opts.period)?;
        return Ok(LoadedData {
            dataset_hash: compute_dataset_hash(&bars),
            bars,
            origin: DataOrigin::Synthetic,
        });
    }

    match failure {
        Some(e) => Err(LoadError::Data(e)),
        None => Err(LoadError::NoSource {
            symbol: symbol.to_string(),
            interval,
        }),
    }
}

/// Compute a deterministic BLAKE3 hash over all bar data.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

// ── CSV directory ────────────────────────────────────────────────────

/// Reads `{dir}/{SYMBOL}_{interval}.csv` with a
/// `timestamp,open,high,low,close,volume` header. Timestamps are RFC 3339.
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &str, interval: Timeframe) -> PathBuf {
        self.dir.join(format!("{symbol}_{interval}.csv"))
    }
}

impl MarketDataSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn get_bars(&self, symbol: &str, interval: Timeframe, period: usize) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(symbol, interval);
        if !path.exists() {
            return Err(DataError::unavailable(
                symbol,
                interval,
                format!("{} not found", path.display()),
            ));
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|e| DataError::Io(e.to_string()))?;
        let mut bars = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| DataError::Parse(format!("{}:{}: {e}", path.display(), line + 2)))?;
            bars.push(Bar::new(row.timestamp, row.open, row.high, row.low, row.close, row.volume));
        }
        let skip = bars.len().saturating_sub(period);
        Ok(bars.split_off(skip))
    }
}

// ── Synthetic ────────────────────────────────────────────────────────

/// Deterministic random-walk bars, seeded from symbol and interval.
///
/// These are clearly fake: a walk from 100.0 with per-bar moves scaled to
/// the interval length.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    /// Timestamp of the last generated bar.
    end: DateTime<Utc>,
}

impl SyntheticSource {
    pub fn ending_at(end: DateTime<Utc>) -> Self {
        Self { end }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            end: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        }
    }
}

impl MarketDataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn get_bars(&self, symbol: &str, interval: Timeframe, period: usize) -> Result<Vec<Bar>, DataError> {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        if period == 0 {
            return Err(DataError::unavailable(symbol, interval, "zero bars requested"));
        }

        let seed = blake3::hash(format!("{symbol}:{interval}").as_bytes());
        let mut rng = StdRng::from_seed(*seed.as_bytes());

        let step = Duration::minutes(i64::from(interval.minutes()));
        let scale = (f64::from(interval.minutes()) / 60.0).sqrt().clamp(0.2, 5.0);
        let start = self.end - step * (period as i32 - 1);
        let mut price = 100.0_f64;

        let bars = (0..period)
            .map(|i| {
                let ret: f64 = rng.gen_range(-0.004..0.0042) * scale;
                let open = price;
                let close = (price * (1.0 + ret)).max(0.01);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002) * scale);
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002) * scale);
                let volume = rng.gen_range(500.0..5_000.0);
                price = close;
                Bar::new(start + step * i as i32, open, high, low, close, volume)
            })
            .collect();
        Ok(bars)
    }
}
