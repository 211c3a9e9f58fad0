//! Confluence Runner: data loading, multi-timeframe orchestration,
//! analysis sessions and the signal log.
//!
//! This crate builds on `confluence-core` to provide:
//! - Bar loading from CSV directories with a synthetic fallback
//! - Parallel fetch + analyze across a timeframe hierarchy
//! - A runner that tags results with data provenance and config hashes
//! - Caller-owned sessions that memoize reports and record emitted signals

pub mod config;
pub mod data_loader;
pub mod multi_timeframe;
pub mod runner;
pub mod session;
pub mod store;

pub use config::{ConfigError, DataConfig, RunConfig, SessionConfig};
pub use data_loader::{
    load_bars, CsvSource, DataLoader, DataOrigin, LoadError, LoadOptions, LoadedData, SyntheticSource,
};
pub use multi_timeframe::{
    analyze_multi_timeframe, evaluate_report, evaluate_timeframe, extend_to_hierarchy, MultiTimeframeAnalysis,
};
pub use runner::{RunError, Runner, SymbolAnalysis};
pub use session::{cache_key, AnalysisSession, SessionStats};
pub use store::{InMemorySignalStore, JsonlSignalStore, SignalRecord, SignalStore};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn sources_are_send_sync() {
        assert_send::<CsvSource>();
        assert_sync::<CsvSource>();
        assert_send::<SyntheticSource>();
        assert_sync::<SyntheticSource>();
    }

    #[test]
    fn loader_is_shareable_across_workers() {
        assert_send::<DataLoader<'static>>();
        assert_sync::<DataLoader<'static>>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<SymbolAnalysis>();
        assert_sync::<SymbolAnalysis>();
        assert_send::<MultiTimeframeAnalysis>();
        assert_sync::<MultiTimeframeAnalysis>();
        assert_send::<SignalRecord>();
        assert_sync::<SignalRecord>();
    }

    #[test]
    fn runner_is_send_sync() {
        assert_send::<Runner>();
        assert_sync::<Runner>();
    }

    #[test]
    fn sessions_are_send() {
        assert_send::<AnalysisSession<InMemorySignalStore>>();
        assert_send::<AnalysisSession<JsonlSignalStore>>();
    }
}
