//! Risk manager: stop selection, R-multiple targets, position sizing and a
//! trade-quality grade.

use serde::{Deserialize, Serialize};

use super::averages::AverageSet;
use crate::config::{RiskConfig, RiskProfile};
use crate::domain::Bar;
use crate::error::EngineError;
use crate::indicators::average_true_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    /// +1 long, -1 short.
    pub fn sign(&self) -> f64 {
        match self {
            TradeSide::Long => 1.0,
            TradeSide::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopMethod {
    Volatility,
    Average { period: usize },
    Structure,
    Swing,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StopLoss {
    pub price: f64,
    pub method: StopMethod,
    /// Distance from entry, percent of entry.
    pub risk_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TakeProfit {
    pub price: f64,
    pub rr_ratio: f64,
    /// Share of the position closed here, percent.
    pub close_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSize {
    pub account_size: f64,
    /// Units to buy or sell.
    pub size: f64,
    pub risk_amount: f64,
    pub position_value: f64,
    /// Position value as a percent of the account.
    pub account_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TradeGrade {
    Poor,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPlan {
    pub side: TradeSide,
    pub entry: f64,
    pub atr: f64,
    pub stop_loss: StopLoss,
    pub take_profits: Vec<TakeProfit>,
    pub risk_profile: RiskProfile,
    pub max_risk_pct: f64,
    pub position_sizing: Vec<PositionSize>,
    /// Close-weighted mean R multiple across targets.
    pub average_rr: f64,
    /// 0.30-0.85.
    pub estimated_win_probability: f64,
    pub expected_return_pct: f64,
    pub grade: TradeGrade,
}

impl RiskPlan {
    pub fn risk_per_unit(&self) -> f64 {
        (self.entry - self.stop_loss.price).abs()
    }
}

/// Scores and levels from the other components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskInputs {
    pub confluence: f64,
    pub trend_strength: f64,
    pub breakout_probability: f64,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

/// Build a risk plan for the last bar's close.
///
/// # Errors
/// `EngineError::InvalidInput` for an empty bar sequence or a non-positive
/// last close.
pub fn compute_risk_plan(
    bars: &[Bar],
    averages: &AverageSet,
    inputs: &RiskInputs,
    config: &RiskConfig,
) -> Result<RiskPlan, EngineError> {
    let last = bars
        .last()
        .ok_or_else(|| EngineError::invalid_input("risk plan needs at least one bar"))?;
    let entry = last.close;
    if !(entry.is_finite() && entry > 0.0) {
        return Err(EngineError::invalid_input(format!(
            "risk plan needs a positive entry price, got {entry}"
        )));
    }

    let side = trade_side(averages);
    let atr = average_true_range(bars, config.atr_period).unwrap_or(last.high - last.low);
    let stop_loss = select_stop(bars, averages, entry, atr, side, inputs, config);
    let take_profits = build_targets(side, entry, stop_loss.price, inputs.support, inputs.resistance, config);

    let combined = (inputs.confluence + inputs.trend_strength + inputs.breakout_probability) / 3.0;
    let (risk_profile, max_risk_pct) = risk_profile(combined, config);
    let risk = (entry - stop_loss.price).abs();
    let position_sizing = size_positions(entry, risk, max_risk_pct, &config.account_sizes);

    let weighted_reward: f64 = take_profits
        .iter()
        .map(|t| (t.price - entry).abs() * t.close_pct / 100.0)
        .sum();
    let average_rr = weighted_reward / risk;
    let p = win_probability(average_rr);
    let expected = p * weighted_reward - (1.0 - p) * risk;

    Ok(RiskPlan {
        side,
        entry,
        atr,
        stop_loss,
        take_profits,
        risk_profile,
        max_risk_pct,
        position_sizing,
        average_rr,
        estimated_win_probability: p,
        expected_return_pct: expected / risk * 100.0,
        grade: grade(average_rr, p),
    })
}

/// Long when the fastest average sits above the next one, short when below.
/// Long when either is undefined.
fn trade_side(averages: &AverageSet) -> TradeSide {
    let last = averages.len().saturating_sub(1);
    let periods = averages.periods();
    match (
        periods.first().and_then(|&p| averages.get(p, last)),
        periods.get(1).and_then(|&p| averages.get(p, last)),
    ) {
        (Some(fast), Some(slow)) if fast < slow => TradeSide::Short,
        _ => TradeSide::Long,
    }
}

/// Tightest candidate at least `min_stop_distance_pct` from entry on the
/// losing side of the trade.
fn select_stop(
    bars: &[Bar],
    averages: &AverageSet,
    entry: f64,
    atr: f64,
    side: TradeSide,
    inputs: &RiskInputs,
    config: &RiskConfig,
) -> StopLoss {
    let s = side.sign();
    let buffer = config.structure_buffer_pct / 100.0;
    let mut candidates: Vec<(f64, StopMethod)> = vec![(entry - s * atr * config.atr_multiplier, StopMethod::Volatility)];

    let last = averages.len().saturating_sub(1);
    for &period in averages.periods().iter().take(2) {
        if let Some(v) = averages.get(period, last) {
            candidates.push((v, StopMethod::Average { period }));
        }
    }

    let level = match side {
        TradeSide::Long => inputs.support,
        TradeSide::Short => inputs.resistance,
    };
    if let Some(level) = level {
        candidates.push((level * (1.0 - s * buffer), StopMethod::Structure));
    }

    let window = &bars[bars.len().saturating_sub(config.swing_window)..];
    let swing = match side {
        TradeSide::Long => window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        TradeSide::Short => window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
    };
    if swing.is_finite() {
        candidates.push((swing * (1.0 - s * buffer), StopMethod::Swing));
    }

    let floor = entry * (1.0 - s * config.min_stop_distance_pct / 100.0);
    let chosen = candidates
        .into_iter()
        .filter(|(price, _)| price.is_finite() && *price > 0.0)
        .filter(|(price, _)| match side {
            TradeSide::Long => *price < floor,
            TradeSide::Short => *price > floor,
        })
        // closest to entry among the valid ones
        .min_by(|a, b| (entry - a.0).abs().total_cmp(&(entry - b.0).abs()));

    let (price, method) =
        chosen.unwrap_or((entry * (1.0 - s * config.fallback_stop_pct / 100.0), StopMethod::Fallback));
    StopLoss {
        price,
        method,
        risk_pct: (entry - price).abs() / entry * 100.0,
    }
}

/// One target per reward multiple. A target is pulled in to just short of
/// the opposing structure level only when it keeps at least
/// `min_reward_ratio`. Short targets at or below zero are unreachable and
/// left out; their close share moves to the furthest reachable target.
pub fn build_targets(
    side: TradeSide,
    entry: f64,
    stop: f64,
    support: Option<f64>,
    resistance: Option<f64>,
    config: &RiskConfig,
) -> Vec<TakeProfit> {
    let risk = (entry - stop).abs();
    let s = side.sign();
    let buffer = config.structure_buffer_pct / 100.0;
    let barrier = match side {
        TradeSide::Long => resistance.map(|r| r * (1.0 - buffer)),
        TradeSide::Short => support.map(|l| l * (1.0 + buffer)),
    };

    let mut targets = Vec::with_capacity(config.reward_multiples.len());
    let mut unplaced_pct = 0.0;
    for (&multiple, &close_pct) in config.reward_multiples.iter().zip(&config.close_pcts) {
        let mut price = entry + s * risk * multiple;
        if let Some(b) = barrier {
            let short_of_target = (b - price) * s < 0.0;
            let rr = (b - entry) * s / risk;
            if short_of_target && rr >= config.min_reward_ratio {
                price = b;
            }
        }
        if price <= 0.0 {
            unplaced_pct += close_pct;
            continue;
        }
        targets.push(TakeProfit {
            price,
            rr_ratio: (price - entry).abs() / risk,
            close_pct,
        });
    }
    if let Some(furthest) = targets.last_mut() {
        furthest.close_pct += unplaced_pct;
    }
    targets
}

fn risk_profile(combined: f64, config: &RiskConfig) -> (RiskProfile, f64) {
    config
        .profiles
        .iter()
        .find(|tier| combined > tier.min_score)
        .or_else(|| config.profiles.last())
        .map(|tier| (tier.profile, tier.max_risk_pct))
        .unwrap_or((RiskProfile::Conservative, 0.5))
}

fn size_positions(entry: f64, risk: f64, max_risk_pct: f64, accounts: &[f64]) -> Vec<PositionSize> {
    accounts
        .iter()
        .map(|&account_size| {
            let risk_amount = account_size * max_risk_pct / 100.0;
            let size = risk_amount / risk;
            let position_value = size * entry;
            PositionSize {
                account_size,
                size,
                risk_amount,
                position_value,
                account_pct: position_value / account_size * 100.0,
            }
        })
        .collect()
}

/// Win probability implied by the average R multiple.
pub fn win_probability(average_rr: f64) -> f64 {
    let p: f64 = if average_rr >= 3.0 {
        0.75
    } else if average_rr >= 2.0 {
        0.65
    } else if average_rr >= 1.5 {
        0.60
    } else if average_rr >= 1.0 {
        0.50
    } else {
        0.35
    };
    p.clamp(0.30, 0.85)
}

pub fn grade(average_rr: f64, win_probability: f64) -> TradeGrade {
    if average_rr >= 2.5 && win_probability >= 0.65 {
        TradeGrade::Excellent
    } else if average_rr >= 2.0 && win_probability >= 0.55 {
        TradeGrade::VeryGood
    } else if average_rr >= 1.5 && win_probability >= 0.50 {
        TradeGrade::Good
    } else if average_rr >= 1.0 && win_probability >= 0.45 {
        TradeGrade::Fair
    } else {
        TradeGrade::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::averages::compute_averages;
    use crate::domain::closes;
    use crate::indicators::{assert_approx, make_bars, make_hlcv};

    fn cfg() -> RiskConfig {
        RiskConfig::default()
    }

    #[test]
    fn targets_at_r_multiples() {
        let targets = build_targets(TradeSide::Long, 100.0, 98.0, None, None, &cfg());
        let prices: Vec<f64> = targets.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![103.0, 104.0, 106.0]);
        let rr: Vec<f64> = targets.iter().map(|t| t.rr_ratio).collect();
        assert_eq!(rr, vec![1.5, 2.0, 3.0]);
        let closes: Vec<f64> = targets.iter().map(|t| t.close_pct).collect();
        assert_eq!(closes, vec![40.0, 35.0, 25.0]);
    }

    #[test]
    fn short_targets_mirror() {
        let targets = build_targets(TradeSide::Short, 100.0, 102.0, None, None, &cfg());
        let prices: Vec<f64> = targets.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![97.0, 96.0, 94.0]);
    }

    #[test]
    fn short_targets_below_zero_are_left_out() {
        // risk 40: 1.5R = 40, 2R = 20, 3R = -20
        let targets = build_targets(TradeSide::Short, 100.0, 140.0, None, None, &cfg());
        let prices: Vec<f64> = targets.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![40.0, 20.0]);
        let closes: Vec<f64> = targets.iter().map(|t| t.close_pct).collect();
        assert_eq!(closes, vec![40.0, 60.0]);

        // risk 82: even 1.5R is below zero
        assert!(build_targets(TradeSide::Short, 100.0, 182.0, None, None, &cfg()).is_empty());
    }

    #[test]
    fn crash_with_wide_wicks_keeps_short_targets_positive() {
        let rows: Vec<(f64, f64, f64, f64)> = (0..30)
            .map(|i| {
                let close = 200.0 - i as f64 * 100.0 / 29.0;
                (close + 40.0, close - 1.0, close, 1000.0)
            })
            .collect();
        let bars = make_hlcv(&rows);
        let set = compute_averages(&closes(&bars), &[2, 3]);
        let plan = compute_risk_plan(&bars, &set, &RiskInputs::default(), &cfg()).unwrap();
        assert_eq!(plan.side, TradeSide::Short);
        assert!(plan.stop_loss.price > plan.entry);
        assert!(plan.take_profits.iter().all(|t| t.price > 0.0));
        assert!(plan.average_rr.is_finite());
    }

    #[test]
    fn resistance_pulls_targets_in_but_not_below_min_rr() {
        // barrier = 104.52 * 0.995 = 103.9974
        let targets = build_targets(TradeSide::Long, 100.0, 98.0, None, Some(104.52), &cfg());
        assert_eq!(targets[0].price, 103.0);
        assert_approx(targets[1].price, 103.9974, 1e-9);
        assert_approx(targets[2].price, 103.9974, 1e-9);
        assert!(targets.iter().all(|t| t.rr_ratio >= 1.0));

        // a barrier inside 1R is ignored
        let targets = build_targets(TradeSide::Long, 100.0, 98.0, None, Some(101.0), &cfg());
        assert_eq!(targets[0].price, 103.0);
    }

    #[test]
    fn win_probability_and_grade_buckets() {
        assert_eq!(win_probability(3.2), 0.75);
        assert_eq!(win_probability(1.7), 0.60);
        assert_eq!(win_probability(0.4), 0.35);
        assert_eq!(grade(2.6, 0.65), TradeGrade::Excellent);
        assert_eq!(grade(2.0, 0.65), TradeGrade::VeryGood);
        assert_eq!(grade(1.5, 0.60), TradeGrade::Good);
        assert_eq!(grade(1.0, 0.50), TradeGrade::Fair);
        assert_eq!(grade(0.5, 0.35), TradeGrade::Poor);
    }

    #[test]
    fn empty_bars_are_invalid_input() {
        let set = compute_averages(&[], &[3, 5]);
        let err = compute_risk_plan(&[], &set, &RiskInputs::default(), &cfg()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn non_positive_price_is_invalid_input() {
        let mut bars = make_bars(&[10.0, 11.0]);
        bars[1].close = 0.0;
        let set = compute_averages(&closes(&bars), &[3, 5]);
        assert!(compute_risk_plan(&bars, &set, &RiskInputs::default(), &cfg()).is_err());
    }

    #[test]
    fn quiet_uptrend_uses_fallback_stop() {
        // nothing sits 5% below price, so the 2% fallback applies
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.1).collect();
        let bars = make_bars(&closes);
        let set = compute_averages(&closes, &[5, 10]);
        let plan = compute_risk_plan(&bars, &set, &RiskInputs::default(), &cfg()).unwrap();
        assert_eq!(plan.side, TradeSide::Long);
        assert_eq!(plan.stop_loss.method, StopMethod::Fallback);
        assert_approx(plan.stop_loss.risk_pct, 2.0, 1e-9);
        assert_approx(plan.average_rr, 1.5 * 0.4 + 2.0 * 0.35 + 3.0 * 0.25, 1e-9);
        assert_eq!(plan.estimated_win_probability, 0.65);
        assert_eq!(plan.grade, TradeGrade::VeryGood);
        assert_eq!(plan.risk_profile, RiskProfile::Conservative);
        assert_eq!(plan.max_risk_pct, 0.5);
    }

    #[test]
    fn average_at_entry_is_never_the_stop() {
        // flat market: both averages sit exactly on the close
        let bars = make_bars(&[100.0; 40]);
        let set = compute_averages(&closes(&bars), &[5, 10]);
        let mut config = cfg();
        config.min_stop_distance_pct = 0.0;
        let plan = compute_risk_plan(&bars, &set, &RiskInputs::default(), &config).unwrap();
        // lows of 99 less the 0.5% buffer beat the 2xATR stop at 96
        assert_eq!(plan.stop_loss.method, StopMethod::Swing);
        assert_approx(plan.stop_loss.price, 99.0 * 0.995, 1e-9);
        assert!(plan.risk_per_unit() > 0.0);
        assert!(plan.average_rr.is_finite());
        assert!(plan.position_sizing.iter().all(|p| p.size.is_finite()));
    }

    #[test]
    fn deep_structure_stop_is_chosen_when_tightest() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.1).collect();
        let bars = make_bars(&closes);
        let set = compute_averages(&closes, &[5, 10]);
        let entry = *closes.last().unwrap();
        let inputs = RiskInputs {
            support: Some(entry * 0.94),
            ..Default::default()
        };
        let plan = compute_risk_plan(&bars, &set, &inputs, &cfg()).unwrap();
        assert_eq!(plan.stop_loss.method, StopMethod::Structure);
        assert_approx(plan.stop_loss.price, entry * 0.94 * 0.995, 1e-9);
    }

    #[test]
    fn sizing_risks_exactly_the_budget() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.1).collect();
        let bars = make_bars(&closes);
        let set = compute_averages(&closes, &[5, 10]);
        let inputs = RiskInputs {
            confluence: 90.0,
            trend_strength: 90.0,
            breakout_probability: 90.0,
            ..Default::default()
        };
        let plan = compute_risk_plan(&bars, &set, &inputs, &cfg()).unwrap();
        assert_eq!(plan.risk_profile, RiskProfile::VeryAggressive);
        assert_eq!(plan.position_sizing.len(), 6);
        for p in &plan.position_sizing {
            assert_approx(p.size * plan.risk_per_unit(), p.account_size * 0.01, 1e-6);
        }
    }
}
