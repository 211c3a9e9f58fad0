//! Single-timeframe pipeline.
//!
//! `ConfluenceEngine::analyze` runs every component over one bar sequence
//! and bundles the results into an `AnalysisReport`. The engine holds only
//! its validated configuration; each call is independent.

pub mod composite;
pub mod pipeline;

pub use composite::{composite_score, CompositeScore};
pub use pipeline::{AnalysisReport, AverageValue, ConfluenceEngine, CrossoverEvent};
