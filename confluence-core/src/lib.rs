//! Confluence Core: indicator primitives, analysis components and the
//! single-timeframe pipeline.
//!
//! This crate contains the whole analytical surface of the engine:
//! - Domain types (bars, timeframes, directions)
//! - Moving averages, RSI, MACD, ATR and volume measures
//! - Trend bias, fair value gaps, market structure and scalp signals
//! - Confluence scoring, risk planning and cross-timeframe aggregation
//! - `ConfluenceEngine`, which runs every component over one bar sequence
//!
//! Fetching data, caching and fan-out across timeframes live in
//! `confluence-runner`.

pub mod components;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;

pub use config::EngineConfig;
pub use engine::{AnalysisReport, ConfluenceEngine};
pub use error::{ConfigError, EngineError};
