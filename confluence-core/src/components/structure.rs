//! Market structure analyzer: swing extrema, support and resistance, trend
//! strength, price patterns, volume profile and breakout likelihood.

use serde::Serialize;

use super::averages::AverageSet;
use crate::config::StructureConfig;
use crate::domain::{closes, volumes, Bar, Direction};
use crate::indicators::volume::mean_ratio;
use crate::indicators::{mean, pearson, population_std, tail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    StrongBullish,
    ModerateBullish,
    Sideways,
    ModerateBearish,
    StrongBearish,
}

impl TrendDirection {
    pub fn direction(&self) -> Direction {
        match self {
            TrendDirection::StrongBullish | TrendDirection::ModerateBullish => Direction::Bullish,
            TrendDirection::StrongBearish | TrendDirection::ModerateBearish => Direction::Bearish,
            TrendDirection::Sideways => Direction::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reliability {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
}

/// A support or resistance level and how many other swings cluster near it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Level {
    pub price: f64,
    pub strength: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceZone {
    Resistance,
    Support,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StructurePattern {
    HigherHighsHigherLows,
    LowerHighsLowerLows,
    TightConsolidation,
    UpwardBreakout,
    DownwardBreakout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketCharacter {
    Trending,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendStrength {
    pub direction: TrendDirection,
    /// 0-100.
    pub score: f64,
    /// Mean of the last 5 closes against the mean of the last 20, percent.
    pub momentum: f64,
    /// Signed pairwise agreement of the averages at the last bar, -100..100.
    pub alignment_pct: f64,
    /// Recent (5) over historical (20) mean volume.
    pub volume_confirmation: f64,
    pub reliability: Reliability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolumeQuality {
    Excellent,
    Good,
    Average,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeProfile {
    /// Recent volume against the 20-bar mean, percent change.
    pub trend_pct: f64,
    /// Correlation of the last nine close changes with their bar volumes.
    pub price_correlation: f64,
    pub quality: VolumeQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreakoutHorizon {
    /// Within about five bars.
    Imminent,
    /// Five to fifteen bars.
    Developing,
    Uncertain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakoutOutlook {
    /// 0-`breakout_cap`.
    pub probability: f64,
    /// 30-bar relative volatility over 10-bar relative volatility.
    pub compression_ratio: f64,
    pub volume_ratio: f64,
    /// Spread of the averages at the last bar as a percent of their mean.
    pub average_spread: Option<f64>,
    pub horizon: BreakoutHorizon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStructure {
    pub swing_highs: Vec<SwingPoint>,
    pub swing_lows: Vec<SwingPoint>,
    pub support: Option<Level>,
    pub resistance: Option<Level>,
    pub zone: PriceZone,
    pub trend: TrendStrength,
    pub patterns: Vec<StructurePattern>,
    pub character: MarketCharacter,
    pub volume_profile: VolumeProfile,
    pub breakout: BreakoutOutlook,
}

impl MarketStructure {
    pub fn trend_direction(&self) -> TrendDirection {
        self.trend.direction
    }

    pub fn trend_strength(&self) -> f64 {
        self.trend.score
    }

    pub fn breakout_probability(&self) -> f64 {
        self.breakout.probability
    }
}

pub fn analyze_structure(bars: &[Bar], averages: &AverageSet, config: &StructureConfig) -> MarketStructure {
    let closes = closes(bars);
    let volumes = volumes(bars);
    let price = closes.last().copied().unwrap_or(0.0);

    let (swing_highs, swing_lows) = find_swings(bars, config.swing_lookback);
    let resistance = nearest_level(&swing_highs, price, config.cluster_pct, |h| h > price);
    let support = nearest_level(&swing_lows, price, config.cluster_pct, |l| l < price);
    let zone = match (resistance, support) {
        (Some(r), _) if price / r.price > 0.98 => PriceZone::Resistance,
        (_, Some(s)) if price / s.price < 1.02 => PriceZone::Support,
        _ => PriceZone::Neutral,
    };

    let patterns = detect_patterns(bars, config);
    let character = if patterns.iter().any(|p| {
        matches!(
            p,
            StructurePattern::HigherHighsHigherLows | StructurePattern::LowerHighsLowerLows
        )
    }) {
        MarketCharacter::Trending
    } else {
        MarketCharacter::Ranging
    };

    MarketStructure {
        swing_highs,
        swing_lows,
        support,
        resistance,
        zone,
        trend: trend_strength(&closes, &volumes, averages),
        patterns,
        character,
        volume_profile: volume_profile(&closes, &volumes),
        breakout: breakout_outlook(&closes, &volumes, averages, config.breakout_cap),
    }
}

/// Bars whose high (low) strictly exceeds (undercuts) every neighbor within
/// `lookback` bars on both sides.
pub fn find_swings(bars: &[Bar], lookback: usize) -> (Vec<SwingPoint>, Vec<SwingPoint>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if lookback == 0 || bars.len() < 2 * lookback + 1 {
        return (highs, lows);
    }
    for i in lookback..bars.len() - lookback {
        let window = (i - lookback..=i + lookback).filter(|&j| j != i);
        let (h, l) = (bars[i].high, bars[i].low);
        if window.clone().all(|j| h > bars[j].high) {
            highs.push(SwingPoint { index: i, price: h });
        }
        if window.clone().all(|j| l < bars[j].low) {
            lows.push(SwingPoint { index: i, price: l });
        }
    }
    (highs, lows)
}

fn nearest_level(
    swings: &[SwingPoint],
    price: f64,
    cluster_pct: f64,
    side: impl Fn(f64) -> bool,
) -> Option<Level> {
    let candidates: Vec<f64> = swings.iter().map(|s| s.price).filter(|&p| side(p)).collect();
    // below price the nearest is the highest, above it the lowest
    let level = candidates
        .iter()
        .copied()
        .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()))?;
    let band = price * cluster_pct / 100.0;
    let clustered = candidates.iter().filter(|&&p| (p - level).abs() < band).count();
    Some(Level {
        price: level,
        strength: clustered.saturating_sub(1),
    })
}

fn alignment_pct(averages: &AverageSet) -> f64 {
    let Some(last) = averages.len().checked_sub(1) else {
        return 0.0;
    };
    let periods = averages.periods();
    if periods.len() < 2 {
        return 0.0;
    }
    let mut score = 0i64;
    for w in periods.windows(2) {
        if let (Some(short), Some(long)) = (averages.get(w[0], last), averages.get(w[1], last)) {
            if short > long {
                score += 1;
            } else if short < long {
                score -= 1;
            }
        }
    }
    score as f64 / (periods.len() - 1) as f64 * 100.0
}

fn trend_strength(closes: &[f64], volumes: &[f64], averages: &AverageSet) -> TrendStrength {
    let momentum = match (mean(tail(closes, 5)), mean(tail(closes, 20))) {
        (Some(short), Some(long)) if long != 0.0 => (short - long) / long * 100.0,
        _ => 0.0,
    };
    let alignment = alignment_pct(averages);
    let volume_confirmation = mean_ratio(volumes, 5, 20);

    let (direction, score) = if alignment > 60.0 && momentum > 1.0 {
        (TrendDirection::StrongBullish, (alignment.abs() + momentum.abs() * 10.0).min(100.0))
    } else if alignment < -60.0 && momentum < -1.0 {
        (TrendDirection::StrongBearish, (alignment.abs() + momentum.abs() * 10.0).min(100.0))
    } else if alignment.abs() > 30.0 {
        let direction = if alignment > 0.0 {
            TrendDirection::ModerateBullish
        } else {
            TrendDirection::ModerateBearish
        };
        (direction, (alignment.abs() + momentum.abs() * 5.0).min(100.0))
    } else {
        (TrendDirection::Sideways, 20.0)
    };

    let reliability = if volume_confirmation > 1.2 && alignment.abs() > 50.0 {
        Reliability::High
    } else if alignment.abs() > 30.0 {
        Reliability::Medium
    } else {
        Reliability::Low
    };

    TrendStrength {
        direction,
        score,
        momentum,
        alignment_pct: alignment,
        volume_confirmation,
        reliability,
    }
}

const PATTERN_WINDOW: usize = 20;

fn detect_patterns(bars: &[Bar], config: &StructureConfig) -> Vec<StructurePattern> {
    let window = &bars[bars.len().saturating_sub(PATTERN_WINDOW)..];
    let closes = closes(window);
    let mut patterns = Vec::new();
    if closes.is_empty() {
        return patterns;
    }

    if closes.len() >= 10 {
        let recent = &window[window.len() - 5..];
        let steps = || recent.windows(2);
        if steps().all(|w| w[1].high >= w[0].high) && steps().all(|w| w[1].low >= w[0].low) {
            patterns.push(StructurePattern::HigherHighsHigherLows);
        }
        if steps().all(|w| w[1].high <= w[0].high) && steps().all(|w| w[1].low <= w[0].low) {
            patterns.push(StructurePattern::LowerHighsLowerLows);
        }
    }

    let (lo, hi) = min_max(&closes);
    if let Some(avg) = mean(&closes).filter(|m| *m != 0.0) {
        if (hi - lo) / avg * 100.0 < config.consolidation_pct {
            patterns.push(StructurePattern::TightConsolidation);
        }
    }

    if closes.len() >= 15 {
        let n = closes.len();
        let (lo, hi) = min_max(&closes[n - 10..n - 2]);
        let moved = closes[n - 1] - closes[n - 3];
        if moved.abs() > (hi - lo) * config.breakout_multiple {
            patterns.push(if moved > 0.0 {
                StructurePattern::UpwardBreakout
            } else {
                StructurePattern::DownwardBreakout
            });
        }
    }
    patterns
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn volume_profile(closes: &[f64], volumes: &[f64]) -> VolumeProfile {
    let trend_pct = (mean_ratio(volumes, 5, 20) - 1.0) * 100.0;
    let changes: Vec<f64> = tail(closes, 10).windows(2).map(|w| w[1] - w[0]).collect();
    let recent_volumes = tail(volumes, 9);
    let price_correlation = if changes.len() == recent_volumes.len() {
        pearson(&changes, recent_volumes).unwrap_or(0.0)
    } else {
        0.0
    };
    let quality = if trend_pct > 20.0 && price_correlation > 0.3 {
        VolumeQuality::Excellent
    } else if trend_pct > 0.0 && price_correlation > 0.0 {
        VolumeQuality::Good
    } else if trend_pct > -10.0 {
        VolumeQuality::Average
    } else {
        VolumeQuality::Poor
    };
    VolumeProfile {
        trend_pct,
        price_correlation,
        quality,
    }
}

fn relative_volatility(values: &[f64]) -> Option<f64> {
    let m = mean(values).filter(|m| *m != 0.0)?;
    Some(population_std(values)? / m)
}

fn breakout_outlook(closes: &[f64], volumes: &[f64], averages: &AverageSet, cap: f64) -> BreakoutOutlook {
    let recent = relative_volatility(tail(closes, 10));
    let historical = relative_volatility(tail(closes, 30));
    let compression_ratio = match (historical, recent) {
        (Some(h), Some(r)) if r > 0.0 => h / r,
        _ => 1.0,
    };
    let volume_ratio = mean_ratio(volumes, 5, 20);

    let latest: Vec<f64> = averages.latest_defined().into_iter().map(|(_, v)| v).collect();
    let average_spread = mean(&latest).filter(|m| *m != 0.0).map(|m| {
        let (lo, hi) = min_max(&latest);
        (hi - lo) / m * 100.0
    });

    let mut probability: f64 = 30.0;
    if compression_ratio > 1.5 {
        probability += 25.0;
    }
    if volume_ratio > 1.2 {
        probability += 20.0;
    }
    if average_spread.is_some_and(|s| s < 2.0) {
        probability += 15.0;
    }
    let probability = probability.min(cap);

    let horizon = if probability > 70.0 {
        BreakoutHorizon::Imminent
    } else if probability > 50.0 {
        BreakoutHorizon::Developing
    } else {
        BreakoutHorizon::Uncertain
    };
    BreakoutOutlook {
        probability,
        compression_ratio,
        volume_ratio,
        average_spread,
        horizon,
    }
}
