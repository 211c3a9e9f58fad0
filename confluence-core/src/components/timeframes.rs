//! Multi-timeframe aggregation.
//!
//! Each timeframe in the hierarchy carries a weight by position (highest
//! timeframe first). Failed timeframes drop out: their weight is missing
//! from the total, so a partial run reads as proportionally weaker
//! agreement instead of an error.

use serde::Serialize;

use crate::config::TimeframeConfig;
use crate::domain::{Direction, Timeframe};

/// What one timeframe contributed, in hierarchy order.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeframeOutcome {
    Analyzed { direction: Direction, strength: f64 },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeframeResult {
    pub timeframe: Timeframe,
    pub bias: Direction,
    pub strength: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeFailure {
    pub timeframe: Timeframe,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    WeakBuy,
    Wait,
    WeakSell,
    Sell,
    StrongSell,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::StrongBuy => "strong_buy",
            Recommendation::Buy => "buy",
            Recommendation::WeakBuy => "weak_buy",
            Recommendation::Wait => "wait",
            Recommendation::WeakSell => "weak_sell",
            Recommendation::Sell => "sell",
            Recommendation::StrongSell => "strong_sell",
        };
        f.write_str(s)
    }
}

/// Bias at the first three hierarchy positions; `None` where that
/// timeframe failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeframeSummary {
    pub higher: Option<Direction>,
    pub current: Option<Direction>,
    pub lower: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeAggregate {
    pub results: Vec<TimeframeResult>,
    pub failures: Vec<TimeframeFailure>,
    /// Weight of the non-neutral timeframes over the configured total, percent.
    pub confluence_score: f64,
    /// Signed weight sum: positive is bullish agreement.
    pub trend_alignment: f64,
    pub trend_direction: Direction,
    pub signal_strength: SignalStrength,
    /// 0-100.
    pub entry_confidence: f64,
    pub recommendation: Recommendation,
    /// Weight of the timeframes that produced a result.
    pub total_weight: f64,
    /// Weight of every timeframe in the hierarchy.
    pub configured_weight: f64,
    pub summary: TimeframeSummary,
}

pub fn aggregate_timeframes(
    outcomes: &[(Timeframe, TimeframeOutcome)],
    config: &TimeframeConfig,
) -> TimeframeAggregate {
    let mut results = Vec::new();
    let mut failures = Vec::new();
    let mut directions = Vec::with_capacity(outcomes.len());
    for (position, (timeframe, outcome)) in outcomes.iter().enumerate() {
        match outcome {
            TimeframeOutcome::Analyzed { direction, strength } => {
                results.push(TimeframeResult {
                    timeframe: *timeframe,
                    bias: *direction,
                    strength: *strength,
                    weight: config.weight_at(position),
                });
                directions.push(Some(*direction));
            }
            TimeframeOutcome::Failed { reason } => {
                failures.push(TimeframeFailure {
                    timeframe: *timeframe,
                    reason: reason.clone(),
                });
                directions.push(None);
            }
        }
    }

    let configured_weight: f64 = (0..outcomes.len()).map(|i| config.weight_at(i)).sum();
    let total_weight: f64 = results.iter().map(|r| r.weight).sum();
    let agreeing: f64 = results
        .iter()
        .filter(|r| r.bias != Direction::Neutral)
        .map(|r| r.weight)
        .sum();
    let trend_alignment: f64 = results.iter().map(|r| r.weight * r.bias.sign()).sum();
    let confluence_score = if configured_weight > 0.0 {
        agreeing / configured_weight * 100.0
    } else {
        0.0
    };
    let trend_direction = if trend_alignment > 0.0 {
        Direction::Bullish
    } else if trend_alignment < 0.0 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    TimeframeAggregate {
        confluence_score,
        trend_alignment,
        trend_direction,
        signal_strength: signal_strength(confluence_score),
        entry_confidence: entry_confidence(&results),
        recommendation: recommendation(confluence_score, trend_direction),
        total_weight,
        configured_weight,
        summary: TimeframeSummary {
            higher: directions.first().copied().flatten(),
            current: directions.get(1).copied().flatten(),
            lower: directions.get(2).copied().flatten(),
        },
        results,
        failures,
    }
}

fn signal_strength(confluence: f64) -> SignalStrength {
    if confluence >= 85.0 {
        SignalStrength::VeryStrong
    } else if confluence >= 70.0 {
        SignalStrength::Strong
    } else if confluence >= 55.0 {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    }
}

fn entry_confidence(results: &[TimeframeResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total = results.len() as f64;
    let bullish = results.iter().filter(|r| r.bias == Direction::Bullish).count();
    let bearish = results.iter().filter(|r| r.bias == Direction::Bearish).count();
    let majority = bullish.max(bearish) as f64 / total;
    let avg_strength = results.iter().map(|r| r.strength).sum::<f64>() / total;
    ((majority * 0.7 + avg_strength / 100.0 * 0.3) * 100.0).min(100.0)
}

fn recommendation(confluence: f64, trend: Direction) -> Recommendation {
    match trend {
        Direction::Bullish if confluence >= 80.0 => Recommendation::StrongBuy,
        Direction::Bullish if confluence >= 65.0 => Recommendation::Buy,
        Direction::Bullish if confluence >= 50.0 => Recommendation::WeakBuy,
        Direction::Bearish if confluence >= 80.0 => Recommendation::StrongSell,
        Direction::Bearish if confluence >= 65.0 => Recommendation::Sell,
        Direction::Bearish if confluence >= 50.0 => Recommendation::WeakSell,
        _ => Recommendation::Wait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzed(direction: Direction, strength: f64) -> TimeframeOutcome {
        TimeframeOutcome::Analyzed { direction, strength }
    }

    fn hierarchy() -> [Timeframe; 4] {
        Timeframe::H1.hierarchy()
    }

    #[test]
    fn unanimous_bullish_is_strong_buy() {
        let tfs = hierarchy();
        let outcomes: Vec<_> = tfs.iter().map(|&tf| (tf, analyzed(Direction::Bullish, 100.0))).collect();
        let agg = aggregate_timeframes(&outcomes, &TimeframeConfig::default());
        assert!((agg.confluence_score - 100.0).abs() < 1e-9);
        assert!((agg.trend_alignment - 1.0).abs() < 1e-9);
        assert_eq!(agg.trend_direction, Direction::Bullish);
        assert_eq!(agg.recommendation, Recommendation::StrongBuy);
        assert_eq!(agg.signal_strength, SignalStrength::VeryStrong);
        assert!((agg.entry_confidence - 100.0).abs() < 1e-9);
    }

    #[test]
    fn failed_timeframe_reduces_weight() {
        let tfs = hierarchy();
        let outcomes = vec![
            (tfs[0], TimeframeOutcome::Failed { reason: "timeout".into() }),
            (tfs[1], analyzed(Direction::Bullish, 75.0)),
            (tfs[2], analyzed(Direction::Bullish, 75.0)),
            (tfs[3], analyzed(Direction::Bullish, 75.0)),
        ];
        let agg = aggregate_timeframes(&outcomes, &TimeframeConfig::default());
        assert!((agg.total_weight - 0.6).abs() < 1e-9);
        assert!(agg.total_weight <= agg.configured_weight);
        assert!((agg.confluence_score - 60.0).abs() < 1e-9);
        assert_eq!(agg.recommendation, Recommendation::WeakBuy);
        assert_eq!(agg.failures.len(), 1);
        assert_eq!(agg.failures[0].timeframe, tfs[0]);
        assert_eq!(agg.summary.higher, None);
        assert_eq!(agg.summary.current, Some(Direction::Bullish));
    }

    #[test]
    fn neutral_timeframes_do_not_count_toward_confluence() {
        let tfs = hierarchy();
        let outcomes = vec![
            (tfs[0], analyzed(Direction::Bearish, 100.0)),
            (tfs[1], analyzed(Direction::Bearish, 50.0)),
            (tfs[2], analyzed(Direction::Neutral, 0.0)),
            (tfs[3], analyzed(Direction::Bullish, 50.0)),
        ];
        let agg = aggregate_timeframes(&outcomes, &TimeframeConfig::default());
        assert!((agg.confluence_score - 80.0).abs() < 1e-9);
        assert!((agg.trend_alignment + 0.6).abs() < 1e-9);
        assert_eq!(agg.recommendation, Recommendation::StrongSell);
        // majority 2/4, mean strength 50
        assert!((agg.entry_confidence - 50.0).abs() < 1e-9);
    }

    #[test]
    fn everything_failed_waits() {
        let tfs = hierarchy();
        let outcomes: Vec<_> = tfs
            .iter()
            .map(|&tf| (tf, TimeframeOutcome::Failed { reason: "no data".into() }))
            .collect();
        let agg = aggregate_timeframes(&outcomes, &TimeframeConfig::default());
        assert_eq!(agg.total_weight, 0.0);
        assert_eq!(agg.confluence_score, 0.0);
        assert_eq!(agg.entry_confidence, 0.0);
        assert_eq!(agg.recommendation, Recommendation::Wait);
        assert_eq!(agg.trend_direction, Direction::Neutral);
    }

    #[test]
    fn positions_past_the_table_use_fallback_weight() {
        let outcomes: Vec<_> = Timeframe::ALL[..6]
            .iter()
            .map(|&tf| (tf, analyzed(Direction::Bullish, 100.0)))
            .collect();
        let agg = aggregate_timeframes(&outcomes, &TimeframeConfig::default());
        assert_eq!(agg.results[5].weight, 0.05);
        assert!((agg.configured_weight - 1.1).abs() < 1e-9);
    }
}
