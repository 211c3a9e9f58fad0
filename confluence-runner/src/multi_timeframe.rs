//! Parallel fetch + analyze across a timeframe hierarchy.
//!
//! Each timeframe loads and analyzes independently on the rayon pool. A
//! timeframe that cannot be loaded, or that has too little history for the
//! bias averages, becomes a failed outcome; the aggregate then carries
//! proportionally less weight instead of the whole run failing. Results
//! are collected in hierarchy order, so scheduling never changes output.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use confluence_core::components::{aggregate_timeframes, TimeframeAggregate, TimeframeOutcome};
use confluence_core::domain::{Bar, Timeframe};
use confluence_core::{AnalysisReport, ConfluenceEngine};

use crate::data_loader::{DataLoader, LoadError};

/// Reports for every timeframe that produced one, plus the aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct MultiTimeframeAnalysis {
    pub symbol: String,
    pub base: Timeframe,
    pub reports: Vec<(Timeframe, AnalysisReport)>,
    pub aggregate: TimeframeAggregate,
}

impl MultiTimeframeAnalysis {
    pub fn report(&self, timeframe: Timeframe) -> Option<&AnalysisReport> {
        self.reports.iter().find(|(tf, _)| *tf == timeframe).map(|(_, r)| r)
    }
}

/// Analyze one timeframe's bars, or turn a load failure into a failed
/// outcome.
pub fn evaluate_timeframe(
    engine: &ConfluenceEngine,
    timeframe: Timeframe,
    bars: Result<Vec<Bar>, LoadError>,
) -> (TimeframeOutcome, Option<AnalysisReport>) {
    let bars = match bars {
        Ok(bars) => bars,
        Err(e) => return failed(timeframe, e.to_string()),
    };
    let needed = engine.min_bars();
    if bars.len() < needed {
        return failed(
            timeframe,
            format!("insufficient history: {} bars, need {needed}", bars.len()),
        );
    }
    match engine.analyze(&bars, timeframe) {
        Ok(report) => analyzed(report),
        Err(e) => failed(timeframe, e.to_string()),
    }
}

/// Use an existing report for its timeframe, subject to the same history
/// requirement as a fresh load.
pub fn evaluate_report(engine: &ConfluenceEngine, report: AnalysisReport) -> (TimeframeOutcome, Option<AnalysisReport>) {
    let needed = engine.min_bars();
    if report.bar_count < needed {
        return failed(
            report.timeframe,
            format!("insufficient history: {} bars, need {needed}", report.bar_count),
        );
    }
    analyzed(report)
}

fn analyzed(report: AnalysisReport) -> (TimeframeOutcome, Option<AnalysisReport>) {
    debug!(
        timeframe = %report.timeframe,
        bias = %report.bias.direction,
        strength = report.bias.strength,
        "timeframe analyzed"
    );
    let outcome = TimeframeOutcome::Analyzed {
        direction: report.bias.direction,
        strength: report.bias.strength,
    };
    (outcome, Some(report))
}

fn failed(timeframe: Timeframe, reason: String) -> (TimeframeOutcome, Option<AnalysisReport>) {
    warn!(%timeframe, %reason, "timeframe excluded from aggregate");
    (TimeframeOutcome::Failed { reason }, None)
}

/// Load and analyze every timeframe in `base`'s hierarchy in parallel.
pub fn analyze_multi_timeframe(
    engine: &ConfluenceEngine,
    loader: &DataLoader<'_>,
    symbol: &str,
    base: Timeframe,
) -> MultiTimeframeAnalysis {
    analyze_hierarchy(engine, loader, symbol, base, None)
}

/// Like [`analyze_multi_timeframe`], but the base timeframe reuses
/// `base_report` instead of being loaded and analyzed again.
pub fn extend_to_hierarchy(
    engine: &ConfluenceEngine,
    loader: &DataLoader<'_>,
    symbol: &str,
    base_report: &AnalysisReport,
) -> MultiTimeframeAnalysis {
    analyze_hierarchy(engine, loader, symbol, base_report.timeframe, Some(base_report))
}

fn analyze_hierarchy(
    engine: &ConfluenceEngine,
    loader: &DataLoader<'_>,
    symbol: &str,
    base: Timeframe,
    base_report: Option<&AnalysisReport>,
) -> MultiTimeframeAnalysis {
    let hierarchy = base.hierarchy();
    let evaluated: Vec<(Timeframe, TimeframeOutcome, Option<AnalysisReport>)> = hierarchy
        .par_iter()
        .map(|&timeframe| {
            let (outcome, report) = match base_report {
                Some(known) if timeframe == base => evaluate_report(engine, known.clone()),
                _ => {
                    let bars = loader.load(symbol, timeframe).map(|loaded| loaded.bars);
                    evaluate_timeframe(engine, timeframe, bars)
                }
            };
            (timeframe, outcome, report)
        })
        .collect();

    let outcomes: Vec<(Timeframe, TimeframeOutcome)> = evaluated
        .iter()
        .map(|(tf, outcome, _)| (*tf, outcome.clone()))
        .collect();
    let aggregate = aggregate_timeframes(&outcomes, &engine.config().timeframes);
    let reports = evaluated
        .into_iter()
        .filter_map(|(tf, _, report)| report.map(|r| (tf, r)))
        .collect();

    MultiTimeframeAnalysis {
        symbol: symbol.to_string(),
        base,
        reports,
        aggregate,
    }
}
