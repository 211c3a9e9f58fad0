//! Overall score combining the single-timeframe scores, the
//! multi-timeframe confluence and the risk plan's reward profile.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositeScore {
    /// 0-100.
    pub value: f64,
    pub quality_multiplier: f64,
}

/// ((confluence + trend + scalp) / 3 + mtf / 100 * 25) * multiplier,
/// clamped to [0, 100]. The multiplier is 1.2 for an average R:R of at
/// least 2.5 and 1.1 for at least 2.0.
pub fn composite_score(
    confluence: f64,
    trend_strength: f64,
    scalp_score: f64,
    mtf_confluence: Option<f64>,
    average_rr: f64,
) -> CompositeScore {
    let base = (confluence + trend_strength + scalp_score) / 3.0;
    let mtf_bonus = mtf_confluence.map_or(0.0, |m| m / 100.0 * 25.0);
    let quality_multiplier = if average_rr >= 2.5 {
        1.2
    } else if average_rr >= 2.0 {
        1.1
    } else {
        1.0
    };
    let raw = (base + mtf_bonus) * quality_multiplier;
    CompositeScore {
        value: if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 },
        quality_multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_average_without_bonus() {
        let c = composite_score(60.0, 30.0, 30.0, None, 1.0);
        assert_eq!(c.value, 40.0);
        assert_eq!(c.quality_multiplier, 1.0);
    }

    #[test]
    fn mtf_and_reward_boost() {
        let c = composite_score(60.0, 30.0, 30.0, Some(80.0), 2.2);
        // (40 + 20) * 1.1
        assert!((c.value - 66.0).abs() < 1e-9);
    }

    #[test]
    fn clamped_to_hundred() {
        let c = composite_score(100.0, 100.0, 100.0, Some(100.0), 3.0);
        assert_eq!(c.value, 100.0);
        assert_eq!(c.quality_multiplier, 1.2);
    }
}
