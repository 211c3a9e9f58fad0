//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * price[t] + (1 - alpha) * EMA[t-1], alpha = 2/(period+1).
//! Seed: EMA[period-1] = SMA of first `period` values.
//! A period longer than the input yields an all-NaN series.

use serde::{Deserialize, Serialize};

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    /// Returns `None` for a zero period.
    pub fn new(period: usize) -> Option<Self> {
        if period == 0 {
            return None;
        }
        Some(Self {
            period,
            name: format!("ema_{period}"),
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.period)
    }
}

/// Compute EMA values from a pre-extracted f64 slice.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let seed_window = &values[..period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in period..n {
        if values[i].is_nan() {
            // once tainted, stay undefined
            return result;
        }
        prev += alpha * (values[i] - prev);
        result[i] = prev;
    }

    result
}

/// EMA over a series that may carry leading NaN warm-up values (e.g. the
/// output of another indicator). The seed window starts at the first defined
/// value.
pub fn ema_after_warmup(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    match values.iter().position(|v| !v.is_nan()) {
        Some(start) => {
            let mut result = vec![f64::NAN; n];
            let tail = ema_of_series(&values[start..], period);
            result[start..].copy_from_slice(&tail);
            result
        }
        None => vec![f64::NAN; n],
    }
}

/// Kind of crossing between a fast and a slow series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crossover {
    /// Fast crossed above slow.
    Bullish,
    /// Fast crossed below slow.
    Bearish,
}

/// Indices where `fast - slow` changes sign strictly (from < 0 to > 0 or the
/// reverse). Undefined points never produce a crossing.
pub fn crossovers(fast: &[f64], slow: &[f64]) -> Vec<(usize, Crossover)> {
    let n = fast.len().min(slow.len());
    let mut events = Vec::new();
    for i in 1..n {
        let prev = fast[i - 1] - slow[i - 1];
        let cur = fast[i] - slow[i];
        if prev.is_nan() || cur.is_nan() {
            continue;
        }
        if prev < 0.0 && cur > 0.0 {
            events.push((i, Crossover::Bullish));
        } else if prev > 0.0 && cur < 0.0 {
            events.push((i, Crossover::Bearish));
        }
    }
    events
}

/// Average per-bar change of a series over the trailing `lookback` bars,
/// evaluated at every index. NaN until `lookback` prior values exist.
pub fn slope(series: &[f64], lookback: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];
    if lookback == 0 {
        return result;
    }
    for i in lookback..n {
        result[i] = (series[i] - series[i - lookback]) / lookback as f64;
    }
    result
}
