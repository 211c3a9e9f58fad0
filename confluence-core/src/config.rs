//! Engine configuration.
//!
//! Every threshold the analyzers use lives here with its default. The
//! defaults reproduce the reference behavior; none of them is derived, so
//! they are all overridable from TOML.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub averages: AverageConfig,
    pub oscillators: OscillatorConfig,
    pub gaps: GapConfig,
    pub structure: StructureConfig,
    pub scalp: ScalpConfig,
    pub risk: RiskConfig,
    pub timeframes: TimeframeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AverageConfig {
    /// Bias averages, ascending.
    pub periods: Vec<usize>,
    /// Fast averages for scalp crossovers; the first two are the fast/slow pair.
    pub scalp_periods: Vec<usize>,
}

impl Default for AverageConfig {
    fn default() -> Self {
        Self {
            periods: vec![45, 89, 144, 200, 276],
            scalp_periods: vec![8, 21],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_period: usize,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_period: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    /// Minimum gap size as a percentage of the gap's lower edge.
    pub min_gap_pct: f64,
    /// How many of the latest gaps the report lists as "recent".
    pub recent_count: usize,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_gap_pct: 0.05,
            recent_count: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Bars on each side a swing extreme must beat.
    pub swing_lookback: usize,
    /// Swings within this percentage of price cluster with a level.
    pub cluster_pct: f64,
    /// Close range (percent of mean close) below which the market is consolidating.
    pub consolidation_pct: f64,
    /// A move larger than this multiple of the prior range is a breakout.
    pub breakout_multiple: f64,
    /// Upper bound on breakout probability.
    pub breakout_cap: f64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            swing_lookback: 2,
            cluster_pct: 1.0,
            consolidation_pct: 3.0,
            breakout_multiple: 1.5,
            breakout_cap: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalpWeights {
    pub crossover: f64,
    pub micro_trend: f64,
    pub momentum: f64,
    pub volume: f64,
    pub pattern: f64,
}

impl Default for ScalpWeights {
    fn default() -> Self {
        Self {
            crossover: 0.30,
            micro_trend: 0.25,
            momentum: 0.25,
            volume: 0.15,
            pattern: 0.05,
        }
    }
}

impl ScalpWeights {
    pub fn total(&self) -> f64 {
        self.crossover + self.micro_trend + self.momentum + self.volume + self.pattern
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalpConfig {
    pub weights: ScalpWeights,
    /// Weighted score a setup must exceed before a Long/Short is issued.
    pub entry_threshold: f64,
    pub confidence_cap: f64,
    pub atr_period: usize,
}

impl Default for ScalpConfig {
    fn default() -> Self {
        Self {
            weights: ScalpWeights::default(),
            entry_threshold: 60.0,
            confidence_cap: 95.0,
            atr_period: 14,
        }
    }
}

/// Named risk appetite chosen from the combined signal-quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
    VeryAggressive,
}

/// One row of the risk-profile table: a combined score strictly above
/// `min_score` selects `profile` with `max_risk_pct` of the account at risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub profile: RiskProfile,
    pub min_score: f64,
    pub max_risk_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub atr_period: usize,
    pub atr_multiplier: f64,
    /// Buffer placed beyond a structural level, percent.
    pub structure_buffer_pct: f64,
    /// A stop candidate must be at least this far from entry, percent.
    pub min_stop_distance_pct: f64,
    /// Stop distance used when no candidate clears the floor, percent.
    pub fallback_stop_pct: f64,
    /// Bars scanned for the recent swing extreme.
    pub swing_window: usize,
    pub reward_multiples: Vec<f64>,
    /// Percentage of the position closed at each target.
    pub close_pcts: Vec<f64>,
    /// Structure nudges never pull a target below this R multiple.
    pub min_reward_ratio: f64,
    pub account_sizes: Vec<f64>,
    /// Highest `min_score` first; the last row is the catch-all.
    pub profiles: Vec<RiskTier>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            atr_multiplier: 2.0,
            structure_buffer_pct: 0.5,
            min_stop_distance_pct: 5.0,
            fallback_stop_pct: 2.0,
            swing_window: 20,
            reward_multiples: vec![1.5, 2.0, 3.0],
            close_pcts: vec![40.0, 35.0, 25.0],
            min_reward_ratio: 1.0,
            account_sizes: vec![1_000.0, 5_000.0, 10_000.0, 25_000.0, 50_000.0, 100_000.0],
            profiles: vec![
                RiskTier {
                    profile: RiskProfile::VeryAggressive,
                    min_score: 80.0,
                    max_risk_pct: 1.0,
                },
                RiskTier {
                    profile: RiskProfile::Aggressive,
                    min_score: 65.0,
                    max_risk_pct: 1.0,
                },
                RiskTier {
                    profile: RiskProfile::Moderate,
                    min_score: 50.0,
                    max_risk_pct: 1.0,
                },
                RiskTier {
                    profile: RiskProfile::Conservative,
                    min_score: f64::NEG_INFINITY,
                    max_risk_pct: 0.5,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    /// Weight per hierarchy position, highest timeframe first.
    pub weights: Vec<f64>,
    /// Weight for positions beyond `weights`.
    pub fallback_weight: f64,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            weights: vec![0.4, 0.3, 0.2, 0.1],
            fallback_weight: 0.05,
        }
    }
}

impl TimeframeConfig {
    pub fn weight_at(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(self.fallback_weight)
    }
}

fn check_periods(field: &'static str, periods: &[usize], min_len: usize) -> Result<(), ConfigError> {
    if periods.is_empty() {
        return Err(ConfigError::EmptyPeriods { field });
    }
    if periods.iter().any(|&p| p == 0) {
        return Err(ConfigError::NonPositivePeriod { field });
    }
    let mut unique = periods.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() < min_len {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("need at least {min_len} distinct periods"),
        });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be positive, got {value}"),
        })
    }
}

/// A distance from entry as a percent of entry. 100 or more would put a
/// long stop at or below zero.
fn check_percent_below_100(field: &'static str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let lower_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if value.is_finite() && lower_ok && value < 100.0 {
        Ok(())
    } else {
        let lower = if allow_zero { "0 <=" } else { "0 <" };
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must satisfy {lower} x < 100, got {value}"),
        })
    }
}

impl EngineConfig {
    /// Reject configurations the analyzers cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_periods("averages.periods", &self.averages.periods, 2)?;
        check_periods("averages.scalp_periods", &self.averages.scalp_periods, 2)?;

        let osc = &self.oscillators;
        for (field, p) in [
            ("oscillators.rsi_period", osc.rsi_period),
            ("oscillators.macd_fast", osc.macd_fast),
            ("oscillators.macd_slow", osc.macd_slow),
            ("oscillators.macd_signal", osc.macd_signal),
            ("oscillators.volume_period", osc.volume_period),
            ("scalp.atr_period", self.scalp.atr_period),
            ("risk.atr_period", self.risk.atr_period),
            ("risk.swing_window", self.risk.swing_window),
        ] {
            if p == 0 {
                return Err(ConfigError::NonPositivePeriod { field });
            }
        }
        if osc.macd_fast >= osc.macd_slow {
            return Err(ConfigError::InvalidValue {
                field: "oscillators.macd_fast",
                reason: "must be shorter than macd_slow".into(),
            });
        }

        if self.gaps.min_gap_pct.is_nan() || self.gaps.min_gap_pct < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "gaps.min_gap_pct",
                reason: "must be non-negative".into(),
            });
        }
        if self.structure.swing_lookback == 0 {
            return Err(ConfigError::NonPositivePeriod {
                field: "structure.swing_lookback",
            });
        }
        check_positive("structure.breakout_multiple", self.structure.breakout_multiple)?;
        check_positive("structure.breakout_cap", self.structure.breakout_cap)?;
        check_positive("scalp.weights", self.scalp.weights.total())?;

        let risk = &self.risk;
        check_positive("risk.atr_multiplier", risk.atr_multiplier)?;
        check_percent_below_100("risk.min_stop_distance_pct", risk.min_stop_distance_pct, true)?;
        check_percent_below_100("risk.fallback_stop_pct", risk.fallback_stop_pct, false)?;
        if risk.reward_multiples.is_empty() {
            return Err(ConfigError::EmptyPeriods {
                field: "risk.reward_multiples",
            });
        }
        for &m in &risk.reward_multiples {
            check_positive("risk.reward_multiples", m)?;
        }
        if risk.reward_multiples.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::InvalidValue {
                field: "risk.reward_multiples",
                reason: "must be strictly ascending".into(),
            });
        }
        if risk.close_pcts.len() != risk.reward_multiples.len() {
            return Err(ConfigError::InvalidValue {
                field: "risk.close_pcts",
                reason: "need one close percentage per reward multiple".into(),
            });
        }
        let close_total: f64 = risk.close_pcts.iter().sum();
        if (close_total - 100.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidValue {
                field: "risk.close_pcts",
                reason: format!("must sum to 100, got {close_total}"),
            });
        }
        if risk.min_reward_ratio > risk.reward_multiples[0] {
            return Err(ConfigError::InvalidValue {
                field: "risk.min_reward_ratio",
                reason: "cannot exceed the first reward multiple".into(),
            });
        }
        if risk.account_sizes.is_empty() {
            return Err(ConfigError::EmptyPeriods {
                field: "risk.account_sizes",
            });
        }
        for &a in &risk.account_sizes {
            check_positive("risk.account_sizes", a)?;
        }
        if risk.profiles.is_empty() {
            return Err(ConfigError::EmptyPeriods {
                field: "risk.profiles",
            });
        }
        for tier in &risk.profiles {
            check_positive("risk.profiles.max_risk_pct", tier.max_risk_pct)?;
        }

        for &w in &self.timeframes.weights {
            check_positive("timeframes.weights", w)?;
        }
        Ok(())
    }

    /// Sort and dedup the period lists ascending. Pairwise comparisons
    /// assume this order.
    pub fn normalized(mut self) -> Self {
        for periods in [&mut self.averages.periods, &mut self.averages.scalp_periods] {
            periods.sort_unstable();
            periods.dedup();
        }
        self.risk
            .profiles
            .sort_by(|a, b| b.min_score.total_cmp(&a.min_score));
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config.normalized())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
