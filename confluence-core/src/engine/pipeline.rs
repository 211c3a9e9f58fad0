//! The single-timeframe analysis pipeline.

use serde::Serialize;
use tracing::debug;

use super::composite::{composite_score, CompositeScore};
use crate::components::confluence::ConfluenceInputs;
use crate::components::{
    analyze_bias, analyze_structure, compute_averages, compute_confluence, compute_oscillators,
    compute_risk_plan, compute_scalp_signal, detect_gaps, BiasResult, ConfluenceScore, GapReport,
    MarketStructure, OscillatorSnapshot, RiskInputs, RiskPlan, ScalpSignal, TimeframeAggregate,
};
use crate::config::EngineConfig;
use crate::domain::{closes, Bar, Timeframe};
use crate::error::{ConfigError, EngineError};
use crate::indicators::{defined, Atr, Crossover, Ema, Indicator, Rsi};

/// Bars over which each average's slope is measured.
const SLOPE_LOOKBACK: usize = 5;

/// Latest value of one bias average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageValue {
    pub period: usize,
    pub value: Option<f64>,
    /// Mean per-bar change over the last five bars.
    pub slope: Option<f64>,
}

/// A crossing of the two fastest bias averages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossoverEvent {
    pub index: usize,
    pub fast_period: usize,
    pub slow_period: usize,
    pub kind: Crossover,
}

/// Everything one pipeline run produces for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub timeframe: Timeframe,
    pub bar_count: usize,
    pub price: f64,
    pub as_of: chrono::DateTime<chrono::Utc>,
    /// Bars needed before every indicator is defined.
    pub warmup_bars: usize,
    pub averages: Vec<AverageValue>,
    pub crossovers: Vec<CrossoverEvent>,
    pub bias: BiasResult,
    pub oscillators: OscillatorSnapshot,
    pub gaps: GapReport,
    pub structure: MarketStructure,
    pub scalp: ScalpSignal,
    pub confluence: ConfluenceScore,
    pub risk: RiskPlan,
    pub composite: CompositeScore,
    pub multi_timeframe: Option<TimeframeAggregate>,
}

impl AnalysisReport {
    pub fn is_warm(&self) -> bool {
        self.bar_count >= self.warmup_bars
    }

    /// Attach a cross-timeframe aggregate and fold its confluence into the
    /// composite score.
    pub fn attach_multi_timeframe(&mut self, aggregate: TimeframeAggregate) {
        self.composite = composite_score(
            self.confluence.value,
            self.structure.trend.score,
            self.scalp.score,
            Some(aggregate.confluence_score),
            self.risk.average_rr,
        );
        self.multi_timeframe = Some(aggregate);
    }
}

/// Runs every component over a bar sequence with one validated
/// configuration.
#[derive(Debug, Clone)]
pub struct ConfluenceEngine {
    config: EngineConfig,
}

impl ConfluenceEngine {
    /// Validate `config` and sort its period lists ascending.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.normalized(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Longest bias period; fewer bars leave the bias undefined.
    pub fn min_bars(&self) -> usize {
        self.config.averages.periods.last().copied().unwrap_or(0)
    }

    /// Bars needed before every indicator the pipeline reads is defined.
    pub fn warmup_bars(&self) -> usize {
        let avg = &self.config.averages;
        let mut indicators: Vec<Box<dyn Indicator>> = avg
            .periods
            .iter()
            .chain(&avg.scalp_periods)
            .filter_map(|&p| Ema::new(p).map(|e| Box::new(e) as Box<dyn Indicator>))
            .collect();
        if let Some(rsi) = Rsi::new(self.config.oscillators.rsi_period) {
            indicators.push(Box::new(rsi));
        }
        if let Some(atr) = Atr::new(self.config.risk.atr_period) {
            indicators.push(Box::new(atr));
        }
        indicators.iter().map(|i| i.lookback() + 1).max().unwrap_or(0)
    }

    /// Run the full single-timeframe pipeline.
    ///
    /// Short histories are not an error: components report undefined or
    /// neutral values. Only an empty sequence or a non-positive last close
    /// fails, since the risk plan has nothing to size against.
    pub fn analyze(&self, bars: &[Bar], timeframe: Timeframe) -> Result<AnalysisReport, EngineError> {
        let last = bars
            .last()
            .ok_or_else(|| EngineError::invalid_input("cannot analyze an empty bar sequence"))?;
        let config = &self.config;
        let closes = closes(bars);

        let averages = compute_averages(&closes, &config.averages.periods);
        let scalp_averages = compute_averages(&closes, &config.averages.scalp_periods);

        let bias = analyze_bias(&averages, &closes);
        debug!(
            %timeframe,
            direction = %bias.direction,
            strength = bias.strength,
            changes = bias.changes.len(),
            "bias"
        );

        let oscillators = compute_oscillators(bars, &averages, &config.oscillators);
        debug!(
            rsi = oscillators.relative_strength,
            macd_bullish = ?oscillators.macd_bullish(),
            volume = ?oscillators.volume.strength,
            "oscillators"
        );

        let gaps = detect_gaps(bars, &config.gaps);
        debug!(
            total = gaps.gaps.len(),
            unfilled = gaps.unfilled().count(),
            signal = ?gaps.signal.primary,
            "gaps"
        );

        let structure = analyze_structure(bars, &averages, &config.structure);
        debug!(
            trend = ?structure.trend.direction,
            score = structure.trend.score,
            breakout = structure.breakout.probability,
            "structure"
        );

        let scalp = compute_scalp_signal(bars, &scalp_averages, timeframe, &config.scalp);
        debug!(action = %scalp.action, score = scalp.score, "scalp");

        let confluence = compute_confluence(&ConfluenceInputs::from_snapshot(&oscillators));
        debug!(value = confluence.value, bias = %confluence.bias, "confluence");

        let risk_inputs = RiskInputs {
            confluence: confluence.value,
            trend_strength: structure.trend.score,
            breakout_probability: structure.breakout.probability,
            support: structure.support.map(|l| l.price),
            resistance: structure.resistance.map(|l| l.price),
        };
        let risk = compute_risk_plan(bars, &averages, &risk_inputs, &config.risk)?;
        debug!(
            side = ?risk.side,
            stop = risk.stop_loss.price,
            grade = ?risk.grade,
            "risk plan"
        );

        let composite = composite_score(
            confluence.value,
            structure.trend.score,
            scalp.score,
            None,
            risk.average_rr,
        );

        let last_index = bars.len() - 1;
        let average_values = averages
            .periods()
            .iter()
            .map(|&period| AverageValue {
                period,
                value: averages
                    .series(period)
                    .and_then(|s| s.get(last_index).copied())
                    .and_then(defined),
                slope: averages.slope_at_last(period, SLOPE_LOOKBACK),
            })
            .collect();
        let crossovers = match averages.periods() {
            [fast, slow, ..] => averages
                .crossovers(*fast, *slow)
                .into_iter()
                .map(|(index, kind)| CrossoverEvent {
                    index,
                    fast_period: *fast,
                    slow_period: *slow,
                    kind,
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(AnalysisReport {
            timeframe,
            bar_count: bars.len(),
            price: last.close,
            as_of: last.timestamp,
            warmup_bars: self.warmup_bars(),
            averages: average_values,
            crossovers,
            bias,
            oscillators,
            gaps,
            structure,
            scalp,
            confluence,
            risk,
            composite,
            multi_timeframe: None,
        })
    }
}
