//! Moving Average Convergence/Divergence.
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(signal) of the line;
//! histogram = line - signal. Undefined (NaN) until each stage warms up.

use serde::{Deserialize, Serialize};

use super::ema::{ema_after_warmup, ema_of_series};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// Full MACD output, each series the same length as the input.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn compute(&self, closes: &[f64]) -> MacdSeries {
        let fast = ema_of_series(closes, self.fast);
        let slow = ema_of_series(closes, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_after_warmup(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        MacdSeries {
            line,
            signal,
            histogram,
        }
    }

    /// Bars required before the histogram is defined.
    pub fn lookback(&self) -> usize {
        self.fast.max(self.slow) + self.signal.saturating_sub(1)
    }
}
