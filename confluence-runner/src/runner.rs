//! Symbol runner: wires together data loading, the engine and the
//! multi-timeframe fan-out.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use confluence_core::domain::Timeframe;
use confluence_core::{AnalysisReport, ConfluenceEngine, EngineError};

use crate::config::{ConfigError, RunConfig};
use crate::data_loader::{DataLoader, DataOrigin, LoadError, LoadOptions};
use crate::multi_timeframe::extend_to_hierarchy;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("signal store error: {0}")]
    Store(#[from] std::io::Error),
}

/// Complete result of analyzing one symbol on one base interval.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub interval: Timeframe,
    pub report: AnalysisReport,
    pub origin: DataOrigin,
    pub dataset_hash: String,
    pub config_hash: String,
}

/// A validated configuration and the engine built from it.
#[derive(Debug, Clone)]
pub struct Runner {
    config: RunConfig,
    engine: ConfluenceEngine,
    config_hash: String,
}

impl Runner {
    pub fn new(config: RunConfig) -> Result<Self, RunError> {
        let engine = ConfluenceEngine::new(config.engine.clone()).map_err(ConfigError::from)?;
        let config_hash = config.config_hash()?;
        Ok(Self {
            config,
            engine,
            config_hash,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn engine(&self) -> &ConfluenceEngine {
        &self.engine
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// Load options implied by the `[data]` section.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            period: self.config.data.fetch_period,
            synthetic: self.config.data.synthetic_fallback,
        }
    }

    /// Analyze `symbol` on `interval`. With `multi_timeframe`, the base
    /// report also carries the aggregate over `interval`'s hierarchy.
    pub fn analyze(
        &self,
        loader: &DataLoader<'_>,
        symbol: &str,
        interval: Timeframe,
        multi_timeframe: bool,
    ) -> Result<SymbolAnalysis, RunError> {
        let loaded = loader.load(symbol, interval)?;
        let mut report = self.engine.analyze(&loaded.bars, interval)?;

        if multi_timeframe {
            let mtf = extend_to_hierarchy(&self.engine, loader, symbol, &report);
            report.attach_multi_timeframe(mtf.aggregate);
        }

        info!(
            symbol,
            %interval,
            confluence = report.confluence.value,
            composite = report.composite.value,
            synthetic = loaded.is_synthetic(),
            "analysis complete"
        );

        Ok(SymbolAnalysis {
            symbol: symbol.to_string(),
            interval,
            report,
            origin: loaded.origin,
            dataset_hash: loaded.dataset_hash,
            config_hash: self.config_hash.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::SyntheticSource;
    use confluence_core::data::MarketDataSource;

    fn small_config() -> RunConfig {
        let mut config = RunConfig::default();
        config.engine.averages.periods = vec![10, 20, 40];
        config.data.fetch_period = 120;
        config
    }

    #[test]
    fn runner_rejects_invalid_engine_config() {
        let mut config = RunConfig::default();
        config.engine.averages.periods.clear();
        assert!(matches!(Runner::new(config), Err(RunError::Config(_))));
    }

    #[test]
    fn analyze_tags_provenance_and_hashes() {
        let runner = Runner::new(small_config()).unwrap();
        let source = SyntheticSource::default();
        let source: &dyn MarketDataSource = &source;
        let loader = DataLoader::new(Some(source), runner.load_options());

        let analysis = runner.analyze(&loader, "ETH", Timeframe::M15, false).unwrap();
        assert_eq!(analysis.origin, DataOrigin::Source("synthetic".into()));
        assert_eq!(analysis.report.bar_count, 120);
        assert_eq!(analysis.config_hash, runner.config_hash());
        assert_eq!(analysis.dataset_hash.len(), 64);
        assert!(analysis.report.multi_timeframe.is_none());
    }

    #[test]
    fn multi_timeframe_attaches_aggregate() {
        let runner = Runner::new(small_config()).unwrap();
        let source = SyntheticSource::default();
        let source: &dyn MarketDataSource = &source;
        let loader = DataLoader::new(Some(source), runner.load_options());

        let analysis = runner.analyze(&loader, "ETH", Timeframe::H1, true).unwrap();
        let aggregate = analysis.report.multi_timeframe.unwrap();
        assert_eq!(aggregate.results.len(), 4);
        assert!(aggregate.failures.is_empty());
    }

    #[test]
    fn missing_data_is_a_data_error() {
        let runner = Runner::new(small_config()).unwrap();
        let loader = DataLoader::new(None, runner.load_options());
        let err = runner.analyze(&loader, "ETH", Timeframe::H1, false).unwrap_err();
        assert!(matches!(err, RunError::Data(_)));
    }
}
