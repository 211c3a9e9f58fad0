//! Single-timeframe confluence score.
//!
//! Five signed contributions (bias 40, relative strength 20, MACD cross 20,
//! volume 10, price position 10) sum to a raw score in [-100, 100], which
//! is rescaled to [0, 100]. Missing inputs contribute nothing, so an
//! all-missing input scores exactly 50.

use serde::Serialize;

use super::oscillators::{AlignmentSummary, OscillatorSnapshot};
use crate::domain::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrengthLabel {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
    VeryWeak,
}

/// Inputs to the scorer. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfluenceInputs {
    pub perfect_bullish: bool,
    pub perfect_bearish: bool,
    /// 0-100 with its direction.
    pub alignment: Option<(f64, Direction)>,
    /// Only pass a value computed from a full window.
    pub relative_strength: Option<f64>,
    /// MACD line above its signal line.
    pub macd_bullish: Option<bool>,
    pub volume_strength: Option<f64>,
    /// -100..100.
    pub price_position: Option<f64>,
}

impl ConfluenceInputs {
    pub fn from_snapshot(snapshot: &OscillatorSnapshot) -> Self {
        let (perfect_bullish, perfect_bearish, alignment) = match &snapshot.alignment {
            Some(AlignmentSummary {
                perfect_bullish,
                perfect_bearish,
                strength,
                direction,
                ..
            }) => (*perfect_bullish, *perfect_bearish, Some((*strength, *direction))),
            None => (false, false, None),
        };
        Self {
            perfect_bullish,
            perfect_bearish,
            alignment,
            relative_strength: snapshot
                .relative_strength_ready
                .then_some(snapshot.relative_strength),
            macd_bullish: snapshot.macd_bullish(),
            volume_strength: snapshot.volume.strength,
            price_position: snapshot.price_position.as_ref().map(|p| p.strength),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfluenceBreakdown {
    pub bias: f64,
    pub relative_strength: f64,
    pub macd: f64,
    pub volume: f64,
    pub price_position: f64,
}

impl ConfluenceBreakdown {
    pub fn raw(&self) -> f64 {
        self.bias + self.relative_strength + self.macd + self.volume + self.price_position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfluenceScore {
    /// 0-100.
    pub value: f64,
    pub label: StrengthLabel,
    pub bias: Direction,
    pub breakdown: ConfluenceBreakdown,
}

pub fn compute_confluence(inputs: &ConfluenceInputs) -> ConfluenceScore {
    let bias = if inputs.perfect_bullish {
        40.0
    } else if inputs.perfect_bearish {
        -40.0
    } else {
        inputs
            .alignment
            .map(|(strength, direction)| strength.clamp(0.0, 100.0) / 100.0 * 40.0 * direction.sign())
            .unwrap_or(0.0)
    };

    let relative_strength = match inputs.relative_strength.filter(|r| r.is_finite()) {
        Some(r) if r > 70.0 => 10.0,
        Some(r) if r > 50.0 => 20.0,
        Some(r) if r < 30.0 => -10.0,
        Some(_) => -20.0,
        None => 0.0,
    };

    let macd = match inputs.macd_bullish {
        Some(true) => 20.0,
        Some(false) => -20.0,
        None => 0.0,
    };

    let volume = match inputs.volume_strength.filter(|v| v.is_finite()) {
        Some(v) if v > 1.5 => 10.0,
        Some(v) if v > 1.0 => 5.0,
        Some(v) if v < 0.8 => -5.0,
        _ => 0.0,
    };

    let price_position = inputs
        .price_position
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(-100.0, 100.0) / 100.0 * 10.0)
        .unwrap_or(0.0);

    let breakdown = ConfluenceBreakdown {
        bias,
        relative_strength,
        macd,
        volume,
        price_position,
    };
    let value = ((breakdown.raw() + 100.0) / 2.0).clamp(0.0, 100.0);

    ConfluenceScore {
        value,
        label: label(value),
        bias: if value > 60.0 {
            Direction::Bullish
        } else if value < 40.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        },
        breakdown,
    }
}

fn label(value: f64) -> StrengthLabel {
    if value > 80.0 {
        StrengthLabel::VeryStrong
    } else if value > 65.0 {
        StrengthLabel::Strong
    } else if value > 35.0 {
        StrengthLabel::Moderate
    } else if value > 20.0 {
        StrengthLabel::Weak
    } else {
        StrengthLabel::VeryWeak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_missing_is_neutral_fifty() {
        let score = compute_confluence(&ConfluenceInputs::default());
        assert_eq!(score.value, 50.0);
        assert_eq!(score.bias, Direction::Neutral);
        assert_eq!(score.label, StrengthLabel::Moderate);
    }

    #[test]
    fn everything_bullish_tops_out() {
        let inputs = ConfluenceInputs {
            perfect_bullish: true,
            relative_strength: Some(60.0),
            macd_bullish: Some(true),
            volume_strength: Some(2.0),
            price_position: Some(100.0),
            ..Default::default()
        };
        let score = compute_confluence(&inputs);
        assert_eq!(score.breakdown.raw(), 100.0);
        assert_eq!(score.value, 100.0);
        assert_eq!(score.label, StrengthLabel::VeryStrong);
        assert_eq!(score.bias, Direction::Bullish);
    }

    #[test]
    fn everything_bearish_bottoms_out() {
        let inputs = ConfluenceInputs {
            perfect_bearish: true,
            relative_strength: Some(45.0),
            macd_bullish: Some(false),
            volume_strength: Some(0.5),
            price_position: Some(-100.0),
            ..Default::default()
        };
        let score = compute_confluence(&inputs);
        assert_eq!(score.value, 2.5);
        assert_eq!(score.label, StrengthLabel::VeryWeak);
        assert_eq!(score.bias, Direction::Bearish);
    }

    #[test]
    fn overbought_counts_less_than_healthy_strength() {
        let hot = compute_confluence(&ConfluenceInputs {
            relative_strength: Some(80.0),
            ..Default::default()
        });
        let healthy = compute_confluence(&ConfluenceInputs {
            relative_strength: Some(60.0),
            ..Default::default()
        });
        assert_eq!(hot.value, 55.0);
        assert_eq!(healthy.value, 60.0);
    }

    #[test]
    fn partial_alignment_scales_bias() {
        let score = compute_confluence(&ConfluenceInputs {
            alignment: Some((50.0, Direction::Bearish)),
            ..Default::default()
        });
        assert_eq!(score.breakdown.bias, -20.0);
        assert_eq!(score.value, 40.0);
        assert_eq!(score.bias, Direction::Neutral);
    }
}
