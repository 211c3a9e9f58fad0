//! Indicator primitives.
//!
//! Every series-producing indicator returns a `Vec<f64>` the same length as
//! its input, with `f64::NAN` marking warm-up positions. NaN is the
//! "undefined" sentinel throughout the engine; callers convert it to `Option`
//! at the point of use.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use atr::{average_true_range, true_range, Atr};
pub use ema::{crossovers, ema_of_series, slope, Crossover, Ema};
pub use macd::{Macd, MacdSeries};
pub use rsi::Rsi;
pub use sma::{mean, pearson, population_std, tail};
pub use volume::{on_balance_volume, VolumeAnalysis, VolumeTrend};

use crate::domain::Bar;

/// Bar-series indicator.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_45", "rsi_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Convert a NaN sentinel into `None`.
pub fn defined(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Last defined value of a series, if the final entry is defined.
pub fn last_defined(series: &[f64]) -> Option<f64> {
    series.last().copied().and_then(defined)
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000,
/// one bar per hour.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Build bars from explicit (high, low, close, volume) tuples.
#[cfg(test)]
pub fn make_hlcv(rows: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    rows.iter()
        .enumerate()
        .map(|(i, &(high, low, close, volume))| Bar {
            timestamp: base + chrono::Duration::hours(i as i64),
            open: close,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
