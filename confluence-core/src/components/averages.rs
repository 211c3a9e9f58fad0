//! Moving-average series calculator.
//!
//! Computes one EMA series per configured period over the close prices.
//! Series are stored in ascending period order, which is the order every
//! pairwise comparison downstream relies on.

use serde::Serialize;

use crate::indicators::{crossovers, defined, ema_of_series, slope, Crossover};

/// Precomputed EMA series keyed by period.
///
/// Built once per analysis and queried by bar index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AverageSet {
    periods: Vec<usize>,
    series: Vec<Vec<f64>>,
    len: usize,
}

/// Compute an EMA for each period over `closes`.
///
/// Periods are sorted and deduplicated. A period longer than the input
/// produces an all-undefined series rather than an error.
pub fn compute_averages(closes: &[f64], periods: &[usize]) -> AverageSet {
    let mut periods: Vec<usize> = periods.iter().copied().filter(|&p| p > 0).collect();
    periods.sort_unstable();
    periods.dedup();
    let series = periods.iter().map(|&p| ema_of_series(closes, p)).collect();
    AverageSet {
        periods,
        series,
        len: closes.len(),
    }
}

impl AverageSet {
    /// Periods, ascending.
    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    /// Number of bars each series covers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn series(&self, period: usize) -> Option<&[f64]> {
        self.periods
            .iter()
            .position(|&p| p == period)
            .map(|i| self.series[i].as_slice())
    }

    /// Series at position `rank` in ascending period order.
    pub fn series_at_rank(&self, rank: usize) -> Option<&[f64]> {
        self.series.get(rank).map(|s| s.as_slice())
    }

    /// Defined value of `period`'s average at `index`.
    pub fn get(&self, period: usize, index: usize) -> Option<f64> {
        self.series(period)
            .and_then(|s| s.get(index).copied())
            .and_then(defined)
    }

    /// All averages at `index`, ascending by period. `None` if any is
    /// undefined there.
    pub fn values_at(&self, index: usize) -> Option<Vec<f64>> {
        self.series
            .iter()
            .map(|s| s.get(index).copied().and_then(defined))
            .collect()
    }

    /// Averages at the last bar, skipping undefined ones.
    pub fn latest_defined(&self) -> Vec<(usize, f64)> {
        let Some(last) = self.len.checked_sub(1) else {
            return Vec::new();
        };
        self.periods
            .iter()
            .zip(&self.series)
            .filter_map(|(&p, s)| defined(s[last]).map(|v| (p, v)))
            .collect()
    }

    /// Longest configured period, or 0 when empty.
    pub fn max_period(&self) -> usize {
        self.periods.last().copied().unwrap_or(0)
    }

    /// Crossings of the `fast` average over the `slow` one. Empty if either
    /// period is not in the set.
    pub fn crossovers(&self, fast: usize, slow: usize) -> Vec<(usize, Crossover)> {
        match (self.series(fast), self.series(slow)) {
            (Some(f), Some(s)) => crossovers(f, s),
            _ => Vec::new(),
        }
    }

    /// Mean per-bar change of `period`'s average over the last `lookback`
    /// bars.
    pub fn slope_at_last(&self, period: usize, lookback: usize) -> Option<f64> {
        self.series(period)
            .and_then(|s| slope(s, lookback).last().copied())
            .and_then(defined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn periods_sorted_and_deduped() {
        let closes: Vec<f64> = (1..=30).map(f64::from).collect();
        let set = compute_averages(&closes, &[21, 8, 21, 13]);
        assert_eq!(set.periods(), &[8, 13, 21]);
        assert_eq!(set.len(), 30);
    }

    #[test]
    fn first_defined_value_is_seed_mean() {
        let closes = [2.0, 4.0, 6.0, 8.0];
        let set = compute_averages(&closes, &[3]);
        assert_eq!(set.get(3, 1), None);
        assert_approx(set.get(3, 2).unwrap(), 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn values_at_requires_every_series() {
        let closes: Vec<f64> = (1..=10).map(f64::from).collect();
        let set = compute_averages(&closes, &[3, 8]);
        assert!(set.values_at(5).is_none());
        let v = set.values_at(9).unwrap();
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn long_period_is_undefined_not_error() {
        let set = compute_averages(&[1.0, 2.0], &[5]);
        assert!(set.series(5).unwrap().iter().all(|v| v.is_nan()));
        assert!(set.latest_defined().is_empty());
    }

    #[test]
    fn crossover_between_members() {
        let mut closes: Vec<f64> = (0..10).map(|i| 110.0 - i as f64).collect();
        closes.extend((1..=10).map(|i| 101.0 + 2.0 * i as f64));
        let set = compute_averages(&closes, &[2, 5]);
        let events = set.crossovers(2, 5);
        assert_eq!(events.first().map(|e| e.1), Some(Crossover::Bullish));
        assert!(set.crossovers(2, 7).is_empty());
    }

    #[test]
    fn slope_of_linear_series() {
        let closes: Vec<f64> = (0..30).map(|i| i as f64 * 2.0).collect();
        let set = compute_averages(&closes, &[1]);
        assert_eq!(set.slope_at_last(1, 5), Some(2.0));
        assert_eq!(set.slope_at_last(1, 40), None);
        assert_eq!(set.slope_at_last(3, 5), None);
    }
}
