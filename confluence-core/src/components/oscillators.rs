//! Oscillator snapshot: relative strength, MACD, volume, and where price
//! sits against the averages.

use serde::Serialize;

use super::averages::AverageSet;
use crate::config::OscillatorConfig;
use crate::domain::{closes, volumes, Bar, Direction};
use crate::indicators::rsi::NEUTRAL_RSI;
use crate::indicators::{last_defined, Macd, Rsi, VolumeAnalysis};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OscillatorSnapshot {
    /// 0-100; `NEUTRAL_RSI` until the window fills.
    pub relative_strength: f64,
    pub relative_strength_ready: bool,
    pub macd_line: Option<f64>,
    pub signal_line: Option<f64>,
    pub histogram: Option<f64>,
    pub volume: VolumeAnalysis,
    pub price_position: Option<PricePosition>,
    pub alignment: Option<AlignmentSummary>,
}

impl OscillatorSnapshot {
    /// MACD line above its signal line; `None` until both are defined.
    pub fn macd_bullish(&self) -> Option<bool> {
        match (self.macd_line, self.signal_line) {
            (Some(line), Some(signal)) => Some(line > signal),
            _ => None,
        }
    }
}

/// Last close against the last value of each defined average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePosition {
    pub above: usize,
    pub below: usize,
    /// +100 above every average, -100 below every average, otherwise
    /// (above - below) / n * 100.
    pub strength: f64,
    /// (period, percent distance of price from that average).
    pub distances: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequenceQuality {
    Excellent,
    Strong,
    Moderate,
    Weak,
}

/// Ordering of the averages at the last bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentSummary {
    pub perfect_bullish: bool,
    pub perfect_bearish: bool,
    /// |bullish pairs - bearish pairs| / pairs * 100.
    pub strength: f64,
    pub direction: Direction,
    pub quality: SequenceQuality,
    /// (period, percent change of the average over its last four steps).
    pub slopes: Vec<(usize, f64)>,
}

pub fn compute_oscillators(
    bars: &[Bar],
    averages: &AverageSet,
    config: &OscillatorConfig,
) -> OscillatorSnapshot {
    let closes = closes(bars);
    let volumes = volumes(bars);

    let (relative_strength, relative_strength_ready) = match Rsi::new(config.rsi_period) {
        Some(rsi) => (
            rsi.compute_series(&closes)
                .last()
                .copied()
                .unwrap_or(NEUTRAL_RSI),
            rsi.is_ready(closes.len()),
        ),
        None => (NEUTRAL_RSI, false),
    };

    let macd = Macd {
        fast: config.macd_fast,
        slow: config.macd_slow,
        signal: config.macd_signal,
    }
    .compute(&closes);

    OscillatorSnapshot {
        relative_strength,
        relative_strength_ready,
        macd_line: last_defined(&macd.line),
        signal_line: last_defined(&macd.signal),
        histogram: last_defined(&macd.histogram),
        volume: VolumeAnalysis::compute(&volumes, &closes, config.volume_period),
        price_position: closes.last().and_then(|&p| price_position(p, averages)),
        alignment: alignment_summary(averages),
    }
}

/// `None` when no average is defined at the last bar.
pub fn price_position(price: f64, averages: &AverageSet) -> Option<PricePosition> {
    let latest = averages.latest_defined();
    if latest.is_empty() {
        return None;
    }
    let total = latest.len();
    let above = latest.iter().filter(|(_, v)| price > *v).count();
    let below = total - above;
    let strength = if above == total {
        100.0
    } else if below == total {
        -100.0
    } else {
        (above as f64 - below as f64) / total as f64 * 100.0
    };
    let distances = latest
        .iter()
        .filter(|(_, v)| *v != 0.0)
        .map(|&(p, v)| (p, (price - v) / v * 100.0))
        .collect();
    Some(PricePosition {
        above,
        below,
        strength,
        distances,
    })
}

/// `None` unless every average is defined at the last bar.
pub fn alignment_summary(averages: &AverageSet) -> Option<AlignmentSummary> {
    let last = averages.len().checked_sub(1)?;
    let values = averages.values_at(last)?;
    if values.len() < 2 {
        return None;
    }
    let pairs = values.len() - 1;
    let mut score: i64 = 0;
    let mut perfect_bullish = true;
    let mut perfect_bearish = true;
    for w in values.windows(2) {
        if w[0] <= w[1] {
            perfect_bullish = false;
        }
        if w[0] >= w[1] {
            perfect_bearish = false;
        }
        if w[0] > w[1] {
            score += 1;
        } else if w[0] < w[1] {
            score -= 1;
        }
    }
    let strength = score.unsigned_abs() as f64 / pairs as f64 * 100.0;
    let direction = match score {
        s if s > 0 => Direction::Bullish,
        s if s < 0 => Direction::Bearish,
        _ => Direction::Neutral,
    };
    let quality = if strength > 90.0 {
        SequenceQuality::Excellent
    } else if strength > 70.0 {
        SequenceQuality::Strong
    } else if strength > 50.0 {
        SequenceQuality::Moderate
    } else {
        SequenceQuality::Weak
    };

    let slopes = averages
        .periods()
        .iter()
        .enumerate()
        .filter_map(|(rank, &p)| {
            let s = averages.series_at_rank(rank)?;
            if s.len() < 5 {
                return None;
            }
            let (now, then) = (s[s.len() - 1], s[s.len() - 5]);
            (then.is_finite() && then != 0.0).then(|| (p, (now - then) / then * 100.0))
        })
        .collect();

    Some(AlignmentSummary {
        perfect_bullish,
        perfect_bearish,
        strength,
        direction,
        quality,
        slopes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::averages::compute_averages;
    use crate::indicators::make_bars;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn short_history_is_neutral() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let set = compute_averages(&closes(&bars), &[2, 3]);
        let snap = compute_oscillators(&bars, &set, &OscillatorConfig::default());
        assert_eq!(snap.relative_strength, 50.0);
        assert!(!snap.relative_strength_ready);
        assert_eq!(snap.macd_line, None);
        assert_eq!(snap.macd_bullish(), None);
        assert_eq!(snap.volume.strength, None);
    }

    #[test]
    fn uptrend_reads_bullish_everywhere() {
        let bars = make_bars(&rising(80));
        let set = compute_averages(&closes(&bars), &[5, 10, 20]);
        let snap = compute_oscillators(&bars, &set, &OscillatorConfig::default());
        assert!(snap.relative_strength_ready);
        assert_eq!(snap.relative_strength, 100.0);
        assert!(snap.macd_line.unwrap() > 0.0);
        let pos = snap.price_position.unwrap();
        assert_eq!(pos.strength, 100.0);
        assert_eq!(pos.above, 3);
        let align = snap.alignment.unwrap();
        assert!(align.perfect_bullish);
        assert_eq!(align.strength, 100.0);
        assert_eq!(align.direction, Direction::Bullish);
        assert_eq!(align.quality, SequenceQuality::Excellent);
        assert!(align.slopes.iter().all(|(_, s)| *s > 0.0));
    }

    #[test]
    fn mixed_position_strength() {
        let closes: Vec<f64> = rising(40);
        let set = compute_averages(&closes, &[3, 10, 30]);
        // price between the averages: above two, below one
        let latest = set.latest_defined();
        let mid = (latest[0].1 + latest[1].1) / 2.0;
        let pos = price_position(mid, &set).unwrap();
        assert_eq!(pos.above, 2);
        assert_eq!(pos.below, 1);
        assert!((pos.strength - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn alignment_needs_every_average() {
        let set = compute_averages(&rising(10), &[3, 20]);
        assert!(alignment_summary(&set).is_none());
    }
}
