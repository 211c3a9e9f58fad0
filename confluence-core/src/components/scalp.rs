//! Scalp signal generator.
//!
//! Five sub-scores, each 0-100 with a direction, are blended with the
//! configured weights. A Long or Short is issued only when the blended
//! score clears the entry threshold, the signed vote agrees, and price and
//! the fast averages are stacked the same way.

use serde::Serialize;

use super::averages::AverageSet;
use crate::config::ScalpConfig;
use crate::domain::{closes, volumes, Bar, Direction, Timeframe};
use crate::indicators::{average_true_range, mean, tail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub enum ScalpAction {
    Long,
    Short,
    Hold,
}

impl std::fmt::Display for ScalpAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScalpAction::Long => "LONG",
            ScalpAction::Short => "SHORT",
            ScalpAction::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalpQuality {
    Excellent,
    Good,
    Moderate,
    Weak,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryLabel {
    StrongBuy,
    Buy,
    StrongSell,
    Sell,
    NoSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ExitAdvisory {
    /// Price stretched from the fastest average, percent.
    AverageDistance { pct: f64 },
    /// Large move over the last three bars, percent.
    MomentumExhaustion { change_pct: f64 },
    TimeExit,
}

/// One weighted input to the scalp score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScore {
    /// 0-100.
    pub score: f64,
    pub direction: Direction,
}

impl SubScore {
    const NONE: SubScore = SubScore {
        score: 0.0,
        direction: Direction::Neutral,
    };

    fn new(score: f64, direction: Direction) -> Self {
        Self { score, direction }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalpComponents {
    pub crossover: SubScore,
    pub micro_trend: SubScore,
    pub momentum: SubScore,
    pub volume: SubScore,
    pub pattern: SubScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalpSignal {
    pub action: ScalpAction,
    /// Weighted score capped at the configured ceiling.
    pub confidence: f64,
    /// Uncapped weighted score.
    pub score: f64,
    pub quality: ScalpQuality,
    pub entry: f64,
    pub stop_loss: Option<f64>,
    pub take_profit_1: Option<f64>,
    pub take_profit_2: Option<f64>,
    /// Volatility-scaled distances, percent of entry.
    pub stop_pct: f64,
    pub tp1_pct: f64,
    pub tp2_pct: f64,
    pub volatility_factor: f64,
    pub hold_time_hint: String,
    pub components: ScalpComponents,
    pub entry_label: EntryLabel,
    pub exits: Vec<ExitAdvisory>,
}

/// Percent change from `window - 1` bars back to the last close.
fn change_pct(closes: &[f64], window: usize) -> f64 {
    let n = closes.len();
    if window == 0 || n < window {
        return 0.0;
    }
    let base = closes[n - window];
    if base == 0.0 {
        0.0
    } else {
        (closes[n - 1] - base) / base * 100.0
    }
}

fn sign_of(value: f64) -> Direction {
    if value > 0.0 {
        Direction::Bullish
    } else if value < 0.0 {
        Direction::Bearish
    } else {
        Direction::Neutral
    }
}

/// Base (stop, tp1, tp2) percentages per timeframe.
pub fn base_risk_pcts(timeframe: Timeframe) -> (f64, f64, f64) {
    match timeframe {
        Timeframe::M1 => (0.15, 0.25, 0.45),
        Timeframe::M3 => (0.2, 0.35, 0.6),
        Timeframe::M5 => (0.25, 0.4, 0.75),
        Timeframe::M15 => (0.35, 0.6, 1.1),
        Timeframe::M20 => (0.4, 0.7, 1.3),
        Timeframe::M30 => (0.5, 0.8, 1.5),
        Timeframe::M45 => (0.6, 1.0, 1.8),
        Timeframe::M55 => (0.7, 1.2, 2.0),
        Timeframe::H1 => (0.8, 1.4, 2.5),
        Timeframe::M10 | Timeframe::H4 | Timeframe::D1 | Timeframe::W1 => (0.3, 0.5, 0.9),
    }
}

fn hold_time_hint(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1-5 minutes",
        Timeframe::M3 | Timeframe::M5 => "5-15 minutes",
        Timeframe::M10 | Timeframe::M15 => "15-45 minutes",
        Timeframe::M20 | Timeframe::M30 => "30-90 minutes",
        Timeframe::M45 | Timeframe::M55 | Timeframe::H1 => "1-3 hours",
        Timeframe::H4 | Timeframe::D1 | Timeframe::W1 => "several hours",
    }
}

/// ATR as a percentage of price, bucketed into a multiplier for the base
/// stop/target table. 1.0 until the ATR window fills.
pub fn volatility_factor(bars: &[Bar], atr_period: usize) -> f64 {
    let (Some(atr), Some(price)) = (average_true_range(bars, atr_period), bars.last().map(|b| b.close)) else {
        return 1.0;
    };
    if price <= 0.0 {
        return 1.0;
    }
    let atr_pct = atr / price * 100.0;
    if atr_pct > 2.0 {
        1.5
    } else if atr_pct > 1.0 {
        1.2
    } else if atr_pct < 0.5 {
        0.8
    } else {
        1.0
    }
}

fn crossover_score(fast: &[f64], slow: &[f64]) -> SubScore {
    let n = fast.len().min(slow.len());
    if n < 3 {
        return SubScore::NONE;
    }
    let window = (n - 3..n).map(|i| (fast[i], slow[i]));
    if window.clone().any(|(f, s)| !f.is_finite() || !s.is_finite()) {
        return SubScore::NONE;
    }
    let above: Vec<bool> = window.map(|(f, s)| f > s).collect();
    let (prev2, prev, now) = (above[0], above[1], above[2]);
    match (prev2, prev, now) {
        (_, false, true) => SubScore::new(80.0, Direction::Bullish),
        (false, true, true) => SubScore::new(60.0, Direction::Bullish),
        (_, true, false) => SubScore::new(80.0, Direction::Bearish),
        (true, false, false) => SubScore::new(60.0, Direction::Bearish),
        (true, true, true) => SubScore::new(40.0, Direction::Bullish),
        (false, false, false) => SubScore::new(40.0, Direction::Bearish),
    }
}

fn micro_trend_score(closes: &[f64]) -> SubScore {
    if closes.len() < 10 {
        return SubScore::NONE;
    }
    let short = change_pct(closes, 5);
    let medium = change_pct(closes, 10);
    if short > 0.5 && medium > 0.0 {
        SubScore::new((short.abs() * 20.0).min(100.0), Direction::Bullish)
    } else if short > 0.1 {
        SubScore::new((short.abs() * 30.0).min(100.0), Direction::Bullish)
    } else if short < -0.5 && medium < 0.0 {
        SubScore::new((short.abs() * 20.0).min(100.0), Direction::Bearish)
    } else if short < -0.1 {
        SubScore::new((short.abs() * 30.0).min(100.0), Direction::Bearish)
    } else {
        SubScore::new(10.0, Direction::Neutral)
    }
}

fn momentum_score(bars: &[Bar], closes: &[f64]) -> SubScore {
    if closes.len() < 5 {
        return SubScore::NONE;
    }
    let roc3 = change_pct(closes, 3);
    let roc5 = change_pct(closes, 5);
    let recent = &bars[bars.len() - 3..];
    let high = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let position = if high > low {
        (closes[closes.len() - 1] - low) / (high - low) * 100.0
    } else {
        50.0
    };

    if roc3 > 0.3 && roc5 > 0.5 {
        SubScore::new(80.0, Direction::Bullish)
    } else if roc3 < -0.3 && roc5 < -0.5 {
        SubScore::new(80.0, Direction::Bearish)
    } else if roc3 > 0.1 && position > 70.0 {
        SubScore::new(60.0, Direction::Bullish)
    } else if roc3 < -0.1 && position < 30.0 {
        SubScore::new(60.0, Direction::Bearish)
    } else if roc3.abs() > 1.0 {
        // exhaustion: scored low and deliberately directionless
        SubScore::new(20.0, Direction::Neutral)
    } else {
        SubScore::NONE
    }
}

fn volume_score(closes: &[f64], volumes: &[f64]) -> SubScore {
    if volumes.len() < 5 {
        return SubScore::NONE;
    }
    let recent = mean(tail(volumes, 3)).unwrap_or(0.0);
    let base = if volumes.len() >= 10 {
        mean(tail(volumes, 10)).unwrap_or(0.0)
    } else {
        recent
    };
    let ratio = if base > 0.0 { recent / base } else { 1.0 };
    let move_pct = change_pct(closes, 3);

    if ratio > 1.5 && move_pct.abs() > 0.2 {
        SubScore::new((ratio * 30.0).min(100.0), sign_of(move_pct))
    } else if ratio > 1.2 {
        SubScore::new((ratio * 20.0).min(100.0), sign_of(move_pct))
    } else if ratio < 0.8 {
        SubScore::new(20.0, Direction::Neutral)
    } else {
        SubScore::new(50.0, Direction::Neutral)
    }
}

fn pattern_score(bars: &[Bar], closes: &[f64]) -> SubScore {
    let n = closes.len();
    if n < 5 {
        return SubScore::NONE;
    }
    let c = |back: usize| closes[n - back];
    let mut bull = 0.0;
    let mut bear = 0.0;

    if c(5) < c(1) && c(3) < c(2) && c(2) > c(1) {
        bull += 30.0; // pullback within an up-move
    }
    if c(5) > c(1) && c(3) > c(2) && c(2) < c(1) {
        bear += 30.0; // bounce within a down-move
    }

    let (b3, b2) = (&bars[n - 3], &bars[n - 2]);
    if b2.low < b3.low && c(1) > c(2) {
        bull += 25.0;
    }
    if b2.high > b3.high && c(1) < c(2) {
        bear += 25.0;
    }

    let prior = &bars[n - 5..n - 1];
    let prior_high = prior.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let prior_low = prior.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    if prior_high > prior_low {
        if c(1) > prior_high {
            bull += 35.0;
        }
        if c(1) < prior_low {
            bear += 35.0;
        }
    }

    let direction = sign_of(bull - bear);
    SubScore::new(f64::min(bull + bear, 100.0), direction)
}

fn quality(score: f64) -> ScalpQuality {
    if score > 75.0 {
        ScalpQuality::Excellent
    } else if score > 60.0 {
        ScalpQuality::Good
    } else if score > 45.0 {
        ScalpQuality::Moderate
    } else if score > 30.0 {
        ScalpQuality::Weak
    } else {
        ScalpQuality::None
    }
}

fn entry_label(score: f64, crossover: Direction) -> EntryLabel {
    match crossover {
        Direction::Bullish if score > 70.0 => EntryLabel::StrongBuy,
        Direction::Bullish if score > 60.0 => EntryLabel::Buy,
        Direction::Bearish if score > 70.0 => EntryLabel::StrongSell,
        Direction::Bearish if score > 60.0 => EntryLabel::Sell,
        _ => EntryLabel::NoSignal,
    }
}

fn exit_advisories(closes: &[f64], fastest: Option<f64>) -> Vec<ExitAdvisory> {
    let mut exits = Vec::new();
    let Some(&price) = closes.last() else {
        return exits;
    };
    if closes.len() < 3 || price == 0.0 {
        return exits;
    }
    if let Some(avg) = fastest {
        let pct = (price - avg).abs() / price * 100.0;
        if pct > 0.3 {
            exits.push(ExitAdvisory::AverageDistance { pct });
        }
    }
    let change_pct = change_pct(closes, 3);
    if change_pct.abs() > 0.8 {
        exits.push(ExitAdvisory::MomentumExhaustion { change_pct });
    }
    exits.push(ExitAdvisory::TimeExit);
    exits
}

/// Score a scalp setup on `bars` using the fast averages in `scalp`.
///
/// The first two scalp periods are the fast/slow crossover pair. With fewer
/// than two series the crossover sub-score is zero and the action is Hold.
pub fn compute_scalp_signal(
    bars: &[Bar],
    scalp: &AverageSet,
    timeframe: Timeframe,
    config: &ScalpConfig,
) -> ScalpSignal {
    let closes = closes(bars);
    let volumes = volumes(bars);
    let price = closes.last().copied().unwrap_or(0.0);

    let fast = scalp.series_at_rank(0).unwrap_or(&[]);
    let slow = scalp.series_at_rank(1).unwrap_or(&[]);

    let components = ScalpComponents {
        crossover: crossover_score(fast, slow),
        micro_trend: micro_trend_score(&closes),
        momentum: momentum_score(bars, &closes),
        volume: volume_score(&closes, &volumes),
        pattern: pattern_score(bars, &closes),
    };
    let w = &config.weights;
    let weighted = [
        (components.crossover, w.crossover),
        (components.micro_trend, w.micro_trend),
        (components.momentum, w.momentum),
        (components.volume, w.volume),
        (components.pattern, w.pattern),
    ];
    let score: f64 = weighted.iter().map(|(s, w)| s.score * w).sum();
    let net: f64 = weighted
        .iter()
        .map(|(s, w)| s.score * w * s.direction.sign())
        .sum();

    let last_fast = fast.last().copied().filter(|v| v.is_finite());
    let last_slow = slow.last().copied().filter(|v| v.is_finite());
    let action = match (last_fast, last_slow) {
        (Some(f), Some(s)) if score > config.entry_threshold => {
            if net > 0.0 && price > f && f > s {
                ScalpAction::Long
            } else if net < 0.0 && price < f && f < s {
                ScalpAction::Short
            } else {
                ScalpAction::Hold
            }
        }
        _ => ScalpAction::Hold,
    };

    let volatility_factor = volatility_factor(bars, config.atr_period);
    let (stop, tp1, tp2) = base_risk_pcts(timeframe);
    let (stop_pct, tp1_pct, tp2_pct) = (
        stop * volatility_factor,
        tp1 * volatility_factor,
        tp2 * volatility_factor,
    );
    let side = match action {
        ScalpAction::Long => Some(1.0),
        ScalpAction::Short => Some(-1.0),
        ScalpAction::Hold => None,
    };
    let level = |pct: f64, toward_profit: bool| {
        side.map(|s| {
            let signed = if toward_profit { s } else { -s };
            price * (1.0 + signed * pct / 100.0)
        })
    };

    ScalpSignal {
        action,
        confidence: score.min(config.confidence_cap),
        score,
        quality: quality(score),
        entry: price,
        stop_loss: level(stop_pct, false),
        take_profit_1: level(tp1_pct, true),
        take_profit_2: level(tp2_pct, true),
        stop_pct,
        tp1_pct,
        tp2_pct,
        volatility_factor,
        hold_time_hint: hold_time_hint(timeframe).to_string(),
        entry_label: entry_label(score, components.crossover.direction),
        exits: exit_advisories(&closes, last_fast),
        components,
    }
}
