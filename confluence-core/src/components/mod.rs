//! Analysis components.
//!
//! Leaves first: averages and oscillators read bars directly; bias,
//! structure, scalp and risk build on the averages; confluence folds the
//! oscillator snapshot into one score; the timeframe aggregator merges
//! per-timeframe bias. Every component is a pure function of its inputs.

pub mod averages;
pub mod bias;
pub mod confluence;
pub mod fvg;
pub mod oscillators;
pub mod risk;
pub mod scalp;
pub mod structure;
pub mod timeframes;

pub use averages::{compute_averages, AverageSet};
pub use bias::{analyze_bias, classify_alignment, BiasChange, BiasPoint, BiasResult, BiasStatistics, Divergence};
pub use confluence::{compute_confluence, ConfluenceBreakdown, ConfluenceInputs, ConfluenceScore, StrengthLabel};
pub use fvg::{detect_gaps, FairValueGap, GapBias, GapKind, GapReport, GapSignal};
pub use oscillators::{compute_oscillators, AlignmentSummary, OscillatorSnapshot, PricePosition, SequenceQuality};
pub use risk::{
    compute_risk_plan, PositionSize, RiskInputs, RiskPlan, StopLoss, StopMethod, TakeProfit, TradeGrade,
    TradeSide,
};
pub use scalp::{compute_scalp_signal, EntryLabel, ExitAdvisory, ScalpAction, ScalpQuality, ScalpSignal};
pub use structure::{
    analyze_structure, BreakoutOutlook, Level, MarketStructure, PriceZone, StructurePattern, TrendDirection,
    TrendStrength,
};
pub use timeframes::{
    aggregate_timeframes, Recommendation, SignalStrength, TimeframeAggregate, TimeframeOutcome, TimeframeResult,
};
