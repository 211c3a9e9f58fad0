//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! The engine uses the simple mean of the trailing `period` true ranges,
//! evaluated at the last bar only.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Option<Self> {
        if period == 0 {
            return None;
        }
        Some(Self {
            period,
            name: format!("atr_{period}"),
        })
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    /// Rolling mean of true range. TR[0] has no previous close, so the first
    /// defined value is at index `period`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let tr = true_range(bars);
        let n = tr.len();
        let mut result = vec![f64::NAN; n];
        if n <= self.period {
            return result;
        }
        let mut sum: f64 = tr[1..=self.period].iter().sum();
        result[self.period] = sum / self.period as f64;
        for i in (self.period + 1)..n {
            sum += tr[i] - tr[i - self.period];
            result[i] = sum / self.period as f64;
        }
        result
    }
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            tr.push(bar.high - bar.low);
            continue;
        }
        let pc = bars[i - 1].close;
        tr.push(
            (bar.high - bar.low)
                .max((bar.high - pc).abs())
                .max((bar.low - pc).abs()),
        );
    }
    tr
}

/// ATR at the last bar: mean of the trailing `period` true ranges that have a
/// previous close. `None` when fewer than `period + 1` bars exist.
pub fn average_true_range(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() <= period {
        return None;
    }
    let tr = true_range(bars);
    let window = &tr[tr.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, make_hlcv, DEFAULT_EPSILON};

    #[test]
    fn true_range_uses_previous_close() {
        let bars = make_hlcv(&[(10.0, 9.0, 9.5, 1.0), (12.0, 11.0, 11.5, 1.0)]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 1.0, DEFAULT_EPSILON);
        // gap up: |12 - 9.5| = 2.5 dominates
        assert_approx(tr[1], 2.5, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_of_uniform_bars() {
        // make_bars with a flat series: every TR = 2.0
        let bars = make_bars(&[100.0; 20]);
        assert_approx(average_true_range(&bars, 14).unwrap(), 2.0, DEFAULT_EPSILON);
        let series = Atr::new(14).unwrap().compute(&bars);
        assert!(series[13].is_nan());
        assert_approx(series[14], 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_needs_period_plus_one_bars() {
        let bars = make_bars(&[100.0; 14]);
        assert!(average_true_range(&bars, 14).is_none());
        assert!(average_true_range(&bars, 0).is_none());
    }
}
