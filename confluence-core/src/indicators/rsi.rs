//! Relative Strength Index (RSI).
//!
//! Simple rolling means of gains and losses over `period` changes:
//! RSI = 100 - 100 / (1 + mean_gain / mean_loss).
//! Edge cases: no movement → 50; mean_loss == 0 → 100; mean_gain == 0 → 0.
//! Positions without a full window report the neutral 50.

use super::Indicator;
use crate::domain::Bar;

pub const NEUTRAL_RSI: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Option<Self> {
        if period == 0 {
            return None;
        }
        Some(Self {
            period,
            name: format!("rsi_{period}"),
        })
    }

    /// RSI over a close series. Warm-up positions hold `NEUTRAL_RSI`.
    pub fn compute_series(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut result = vec![NEUTRAL_RSI; n];
        if n <= self.period {
            return result;
        }

        let mut gains = vec![0.0; n];
        let mut losses = vec![0.0; n];
        for i in 1..n {
            let ch = closes[i] - closes[i - 1];
            if ch > 0.0 {
                gains[i] = ch;
            } else if ch < 0.0 {
                losses[i] = -ch;
            }
        }

        let mut gain_sum: f64 = gains[1..=self.period].iter().sum();
        let mut loss_sum: f64 = losses[1..=self.period].iter().sum();
        result[self.period] = rsi_value(gain_sum, loss_sum);
        for i in (self.period + 1)..n {
            gain_sum += gains[i] - gains[i - self.period];
            loss_sum += losses[i] - losses[i - self.period];
            result[i] = rsi_value(gain_sum, loss_sum);
        }
        result
    }

    /// True when the final value comes from a full window.
    pub fn is_ready(&self, len: usize) -> bool {
        len > self.period
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        self.compute_series(&closes)
    }
}

// Sums over the same window, so the ratio equals the ratio of means.
fn rsi_value(gain_sum: f64, loss_sum: f64) -> f64 {
    // rolling subtraction can leave tiny negative residue
    let gain = gain_sum.max(0.0);
    let loss = loss_sum.max(0.0);
    if gain <= f64::EPSILON && loss <= f64::EPSILON {
        NEUTRAL_RSI
    } else if loss <= f64::EPSILON {
        100.0
    } else if gain <= f64::EPSILON {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + gain / loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn rsi_all_gains() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let result = Rsi::new(3).unwrap().compute(&bars);
        assert_approx(result[3], 100.0, 1e-6);
        assert_approx(result[5], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let bars = make_bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let result = Rsi::new(3).unwrap().compute(&bars);
        assert_approx(result[3], 0.0, 1e-6);
    }

    #[test]
    fn rsi_known_window() {
        // Changes: +0.34, -0.25, -0.48 → gains 0.34, losses 0.73
        // RSI = 100 - 100 / (1 + 0.34/0.73) ≈ 31.7757
        let result = Rsi::new(3).unwrap().compute_series(&[44.0, 44.34, 44.09, 43.61]);
        assert_approx(result[3], 31.775700934579, 1e-6);
    }

    #[test]
    fn warmup_reports_neutral() {
        let rsi = Rsi::new(14).unwrap();
        let result = rsi.compute_series(&[1.0, 2.0, 3.0]);
        assert!(result.iter().all(|&v| v == NEUTRAL_RSI));
        assert!(!rsi.is_ready(3));
        assert!(rsi.is_ready(15));
    }

    #[test]
    fn flat_series_is_neutral() {
        let result = Rsi::new(3).unwrap().compute_series(&[10.0; 8]);
        assert_approx(result[7], 50.0, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let closes = [100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0];
        for (i, &v) in Rsi::new(3).unwrap().compute_series(&closes).iter().enumerate() {
            assert!((0.0..=100.0).contains(&v), "RSI out of bounds at bar {i}: {v}");
        }
    }
}
