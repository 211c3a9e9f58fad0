//! Bias analyzer.
//!
//! Compares each adjacent pair of averages (shorter, longer) at every bar.
//! Shorter above longer is a bullish pair, below is bearish; the majority
//! wins and strength is the share of pairs agreeing with it.

use serde::Serialize;

use super::averages::AverageSet;
use crate::domain::Direction;

/// Bias at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BiasPoint {
    pub direction: Direction,
    /// 0-100.
    pub strength: f64,
    pub aligned_count: usize,
}

impl BiasPoint {
    pub const NEUTRAL: BiasPoint = BiasPoint {
        direction: Direction::Neutral,
        strength: 0.0,
        aligned_count: 0,
    };
}

/// Bar at which the bias switched to `direction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BiasChange {
    pub index: usize,
    pub direction: Direction,
}

/// Price moving against the prevailing bias. `kind` is the direction the
/// divergence warns of: price rising under a bearish bias is a bearish
/// divergence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Divergence {
    pub index: usize,
    pub kind: Direction,
    /// Five-bar fractional price change at `index`.
    pub price_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasStatistics {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    pub bullish_pct: f64,
    pub bearish_pct: f64,
    pub neutral_pct: f64,
    /// Mean of the non-zero strengths.
    pub average_strength: f64,
    pub peak_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasResult {
    pub direction: Direction,
    pub strength: f64,
    pub aligned_count: usize,
    pub total_pairs: usize,
    pub history: Vec<BiasPoint>,
    pub changes: Vec<BiasChange>,
    pub divergences: Vec<Divergence>,
    pub statistics: BiasStatistics,
}

const DIVERGENCE_WINDOW: usize = 5;

/// Classify a set of averages ordered by ascending period.
///
/// Any non-finite value makes the point Neutral with strength 0.
pub fn classify_alignment(values: &[f64]) -> BiasPoint {
    if values.len() < 2 || values.iter().any(|v| !v.is_finite()) {
        return BiasPoint::NEUTRAL;
    }
    let pairs = values.len() - 1;
    let mut bullish = 0;
    let mut bearish = 0;
    for w in values.windows(2) {
        if w[0] > w[1] {
            bullish += 1;
        } else if w[0] < w[1] {
            bearish += 1;
        }
    }
    let (direction, aligned_count) = if bullish > bearish {
        (Direction::Bullish, bullish)
    } else if bearish > bullish {
        (Direction::Bearish, bearish)
    } else {
        (Direction::Neutral, 0)
    };
    BiasPoint {
        direction,
        strength: aligned_count as f64 / pairs as f64 * 100.0,
        aligned_count,
    }
}

/// Bias over the full history, plus the change events, divergences and
/// statistics derived from it.
pub fn analyze_bias(averages: &AverageSet, closes: &[f64]) -> BiasResult {
    let n = averages.len();
    let history: Vec<BiasPoint> = (0..n)
        .map(|i| match averages.values_at(i) {
            Some(values) => classify_alignment(&values),
            None => BiasPoint::NEUTRAL,
        })
        .collect();

    let latest = history.last().copied().unwrap_or(BiasPoint::NEUTRAL);
    BiasResult {
        direction: latest.direction,
        strength: latest.strength,
        aligned_count: latest.aligned_count,
        total_pairs: averages.periods().len().saturating_sub(1),
        changes: bias_changes(&history),
        divergences: divergences(&history, closes),
        statistics: statistics(&history),
        history,
    }
}

fn bias_changes(history: &[BiasPoint]) -> Vec<BiasChange> {
    history
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0].direction != w[1].direction)
        .map(|(i, w)| BiasChange {
            index: i + 1,
            direction: w[1].direction,
        })
        .collect()
}

fn divergences(history: &[BiasPoint], closes: &[f64]) -> Vec<Divergence> {
    let n = history.len().min(closes.len());
    let mut out = Vec::new();
    for i in DIVERGENCE_WINDOW..n {
        let base = closes[i - DIVERGENCE_WINDOW];
        let change = if base != 0.0 {
            closes[i] / base - 1.0
        } else {
            0.0
        };
        let rising = change > 0.0;
        let kind = match (rising, history[i].direction) {
            (true, Direction::Bearish) => Direction::Bearish,
            (false, Direction::Bullish) => Direction::Bullish,
            _ => continue,
        };
        out.push(Divergence {
            index: i,
            kind,
            price_change: change,
        });
    }
    out
}

fn statistics(history: &[BiasPoint]) -> BiasStatistics {
    let count = |d: Direction| history.iter().filter(|p| p.direction == d).count();
    let bullish = count(Direction::Bullish);
    let bearish = count(Direction::Bearish);
    let neutral = count(Direction::Neutral);
    let pct = |c: usize| {
        if history.is_empty() {
            0.0
        } else {
            c as f64 / history.len() as f64 * 100.0
        }
    };
    let nonzero: Vec<f64> = history
        .iter()
        .map(|p| p.strength)
        .filter(|s| *s > 0.0)
        .collect();
    BiasStatistics {
        bullish,
        bearish,
        neutral,
        bullish_pct: pct(bullish),
        bearish_pct: pct(bearish),
        neutral_pct: pct(neutral),
        average_strength: crate::indicators::mean(&nonzero).unwrap_or(0.0),
        peak_strength: history.iter().map(|p| p.strength).fold(0.0, f64::max),
    }
}
