//! Market data collaborator trait and structured error types.
//!
//! The engine never fetches data itself. Callers hand it bars obtained from a
//! `MarketDataSource`, which may be a CSV directory, an exchange client, or a
//! test double.

use thiserror::Error;

use crate::domain::{Bar, Timeframe};

/// Structured error types for data retrieval.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("no data for {symbol} {interval}: {reason}")]
    DataUnavailable {
        symbol: String,
        interval: Timeframe,
        reason: String,
    },

    #[error("fetch for {symbol} {interval} timed out after {secs}s")]
    Timeout {
        symbol: String,
        interval: Timeframe,
        secs: u64,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl DataError {
    pub fn unavailable(symbol: &str, interval: Timeframe, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            interval,
            reason: reason.into(),
        }
    }
}

/// Supplier of time-ordered bars for a symbol and interval.
///
/// Implementations own retries and timeouts. `period` is the number of most
/// recent bars requested; a source may return fewer. An empty or invalid
/// response must be reported as `DataError::DataUnavailable`.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn get_bars(&self, symbol: &str, interval: Timeframe, period: usize)
        -> Result<Vec<Bar>, DataError>;
}

/// Check a fetched bar sequence and convert empty / unsorted / insane data
/// into `DataUnavailable`.
pub fn validate_bars(symbol: &str, interval: Timeframe, bars: Vec<Bar>) -> Result<Vec<Bar>, DataError> {
    if bars.is_empty() {
        return Err(DataError::unavailable(symbol, interval, "empty response"));
    }
    if !crate::domain::is_time_ordered(&bars) {
        return Err(DataError::unavailable(symbol, interval, "bars are not time-ordered"));
    }
    if let Some(pos) = bars.iter().position(|b| !b.is_sane()) {
        return Err(DataError::unavailable(
            symbol,
            interval,
            format!("bar {pos} failed OHLCV sanity check"),
        ));
    }
    Ok(bars)
}
