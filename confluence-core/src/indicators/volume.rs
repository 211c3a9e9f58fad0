//! Volume measures: relative volume strength, a coarse trend label, and
//! on-balance volume.

use serde::{Deserialize, Serialize};

use super::sma::{mean, tail};

/// Coarse relative-volume bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeTrend {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAnalysis {
    /// Last volume over the mean of the trailing `period` volumes.
    /// `None` until `period` bars exist or when that mean is zero.
    pub strength: Option<f64>,
    pub trend: VolumeTrend,
    /// Cumulative on-balance volume at the last bar.
    pub on_balance_volume: f64,
}

impl VolumeAnalysis {
    pub fn compute(volumes: &[f64], closes: &[f64], period: usize) -> Self {
        let strength = if period > 0 && volumes.len() >= period {
            mean(tail(volumes, period))
                .filter(|avg| *avg > 0.0)
                .and_then(|avg| volumes.last().map(|v| v / avg))
        } else {
            None
        };
        let trend = match strength {
            Some(s) if s > 1.5 => VolumeTrend::High,
            Some(s) if s > 0.8 => VolumeTrend::Normal,
            Some(_) => VolumeTrend::Low,
            None => VolumeTrend::Normal,
        };
        Self {
            strength,
            trend,
            on_balance_volume: on_balance_volume(volumes, closes).last().copied().unwrap_or(0.0),
        }
    }
}

/// On-balance volume series. The first value is the first bar's volume.
pub fn on_balance_volume(volumes: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = volumes.len().min(closes.len());
    let mut obv = Vec::with_capacity(n);
    for i in 0..n {
        if i == 0 {
            obv.push(volumes[0]);
            continue;
        }
        let prev = obv[i - 1];
        let next = if closes[i] > closes[i - 1] {
            prev + volumes[i]
        } else if closes[i] < closes[i - 1] {
            prev - volumes[i]
        } else {
            prev
        };
        obv.push(next);
    }
    obv
}

/// Ratio of the mean of the last `recent` values to the mean of the last
/// `base` values. 1.0 when the base mean is zero or the slice is empty.
pub fn mean_ratio(values: &[f64], recent: usize, base: usize) -> f64 {
    match (mean(tail(values, recent)), mean(tail(values, base))) {
        (Some(r), Some(b)) if b > 0.0 => r / b,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn spike_is_high_volume() {
        let mut volumes = vec![100.0; 19];
        volumes.push(500.0);
        let closes = vec![10.0; 20];
        let va = VolumeAnalysis::compute(&volumes, &closes, 20);
        // mean = (1900 + 500) / 20 = 120 → 500/120
        assert_approx(va.strength.unwrap(), 500.0 / 120.0, DEFAULT_EPSILON);
        assert_eq!(va.trend, VolumeTrend::High);
    }

    #[test]
    fn short_history_has_no_strength() {
        let va = VolumeAnalysis::compute(&[1.0, 2.0], &[1.0, 2.0], 20);
        assert!(va.strength.is_none());
        assert_eq!(va.trend, VolumeTrend::Normal);
    }

    #[test]
    fn obv_accumulates_by_close_direction() {
        let obv = on_balance_volume(&[10.0, 20.0, 30.0, 40.0], &[1.0, 2.0, 1.0, 1.0]);
        assert_eq!(obv, vec![10.0, 30.0, 0.0, 0.0]);
    }

    #[test]
    fn mean_ratio_handles_zero_base() {
        assert_approx(mean_ratio(&[0.0, 0.0], 1, 2), 1.0, DEFAULT_EPSILON);
        assert_approx(mean_ratio(&[1.0, 1.0, 4.0], 1, 3), 2.0, DEFAULT_EPSILON);
    }
}
