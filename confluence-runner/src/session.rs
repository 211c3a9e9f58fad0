//! Caller-owned analysis session.
//!
//! A session memoizes reports for a bounded time and logs emitted signals
//! through its `SignalStore`. Its lifetime belongs to the caller: create
//! one per UI or scan session and drop it on teardown. Nothing here is
//! process-wide.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use confluence_core::domain::Timeframe;

use crate::data_loader::DataLoader;
use crate::runner::{RunError, Runner, SymbolAnalysis};
use crate::store::{InMemorySignalStore, SignalRecord, SignalStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub hits: u64,
    pub misses: u64,
    pub cached: usize,
    pub signals: usize,
}

struct CachedAnalysis {
    stored_at: Instant,
    analysis: SymbolAnalysis,
}

pub struct AnalysisSession<S: SignalStore = InMemorySignalStore> {
    runner: Runner,
    ttl: Duration,
    cache: HashMap<String, CachedAnalysis>,
    store: S,
    hits: u64,
    misses: u64,
}

/// Memoization key: BLAKE3 of symbol, interval, both period lists and the
/// multi-timeframe flag.
pub fn cache_key(
    symbol: &str,
    interval: Timeframe,
    periods: &[usize],
    scalp_periods: &[usize],
    multi_timeframe: bool,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"\0");
    hasher.update(interval.to_string().as_bytes());
    hasher.update(b"\0");
    for p in periods {
        hasher.update(&(*p as u64).to_le_bytes());
    }
    hasher.update(b"\0");
    for p in scalp_periods {
        hasher.update(&(*p as u64).to_le_bytes());
    }
    hasher.update(&[u8::from(multi_timeframe)]);
    hasher.finalize().to_hex().to_string()
}

impl<S: SignalStore> AnalysisSession<S> {
    /// TTL comes from the runner's `[session]` section.
    pub fn new(runner: Runner, store: S) -> Self {
        let ttl = Duration::from_secs(runner.config().session.cache_ttl_secs);
        Self {
            runner,
            ttl,
            cache: HashMap::new(),
            store,
            hits: 0,
            misses: 0,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return a fresh cached analysis or run a new one. A new analysis with
    /// an actionable scalp signal is recorded in the store.
    pub fn analyze(
        &mut self,
        loader: &DataLoader<'_>,
        symbol: &str,
        interval: Timeframe,
        multi_timeframe: bool,
    ) -> Result<SymbolAnalysis, RunError> {
        let averages = &self.runner.config().engine.averages;
        let key = cache_key(
            symbol,
            interval,
            &averages.periods,
            &averages.scalp_periods,
            multi_timeframe,
        );

        if let Some(cached) = self.cache.get(&key) {
            if cached.stored_at.elapsed() < self.ttl {
                self.hits += 1;
                info!(symbol, %interval, "session cache hit");
                return Ok(cached.analysis.clone());
            }
        }

        self.misses += 1;
        let analysis = self.runner.analyze(loader, symbol, interval, multi_timeframe)?;
        if let Some(record) = SignalRecord::from_report(symbol, &analysis.report) {
            let action = record.action;
            if self.store.record(record)? {
                info!(symbol, %interval, %action, "signal emitted");
            } else {
                debug!(symbol, %interval, %action, "duplicate signal suppressed");
            }
        }
        let ttl = self.ttl;
        self.cache.retain(|_, c| c.stored_at.elapsed() < ttl);
        self.cache.insert(
            key,
            CachedAnalysis {
                stored_at: Instant::now(),
                analysis: analysis.clone(),
            },
        );
        Ok(analysis)
    }

    /// Drop every cached analysis for `symbol`.
    pub fn invalidate(&mut self, symbol: &str) {
        self.cache.retain(|_, c| c.analysis.symbol != symbol);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            hits: self.hits,
            misses: self.misses,
            cached: self.cache.len(),
            signals: self.store.len(),
        }
    }

    /// End the session, handing back the signal log.
    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::data_loader::SyntheticSource;
    use chrono::{TimeZone, Utc};
    use confluence_core::components::ScalpAction;
    use confluence_core::data::{DataError, MarketDataSource};
    use confluence_core::domain::Bar;

    fn runner() -> Runner {
        let mut config = RunConfig::default();
        config.engine.averages.periods = vec![10, 20, 40];
        config.data.fetch_period = 100;
        Runner::new(config).unwrap()
    }

    #[test]
    fn cache_key_separates_inputs() {
        let base = cache_key("BTC", Timeframe::H1, &[10, 20], &[8, 21], false);
        assert_eq!(base, cache_key("BTC", Timeframe::H1, &[10, 20], &[8, 21], false));
        assert_ne!(base, cache_key("ETH", Timeframe::H1, &[10, 20], &[8, 21], false));
        assert_ne!(base, cache_key("BTC", Timeframe::M15, &[10, 20], &[8, 21], false));
        assert_ne!(base, cache_key("BTC", Timeframe::H1, &[10, 30], &[8, 21], false));
        assert_ne!(base, cache_key("BTC", Timeframe::H1, &[10, 20], &[8, 21], true));
    }

    #[test]
    fn second_request_within_ttl_hits_cache() {
        let source = SyntheticSource::default();
        let source: &dyn MarketDataSource = &source;
        let mut session = AnalysisSession::new(runner(), InMemorySignalStore::default());
        let loader = DataLoader::new(Some(source), session.runner().load_options());

        let first = session.analyze(&loader, "BTC", Timeframe::M5, false).unwrap();
        let second = session.analyze(&loader, "BTC", Timeframe::M5, false).unwrap();
        assert_eq!(first.dataset_hash, second.dataset_hash);
        let stats = session.stats();
        assert_eq!((stats.hits, stats.misses, stats.cached), (1, 1, 1));
    }

    #[test]
    fn zero_ttl_always_recomputes() {
        let source = SyntheticSource::default();
        let source: &dyn MarketDataSource = &source;
        let mut session =
            AnalysisSession::new(runner(), InMemorySignalStore::default()).with_ttl(Duration::ZERO);
        let loader = DataLoader::new(Some(source), session.runner().load_options());

        session.analyze(&loader, "BTC", Timeframe::M5, false).unwrap();
        session.analyze(&loader, "BTC", Timeframe::M5, false).unwrap();
        assert_eq!(session.stats().misses, 2);
        assert_eq!(session.stats().hits, 0);
    }

    /// A 1%-per-bar rally with a volume surge on the last three bars.
    struct RallySource;

    impl MarketDataSource for RallySource {
        fn name(&self) -> &str {
            "rally"
        }

        fn get_bars(&self, _symbol: &str, _interval: Timeframe, _period: usize) -> Result<Vec<Bar>, DataError> {
            let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
            let closes: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
            Ok(closes
                .iter()
                .enumerate()
                .map(|(i, &close)| {
                    let open = if i == 0 { close } else { closes[i - 1] };
                    Bar {
                        timestamp: base + chrono::Duration::minutes(5 * i as i64),
                        open,
                        high: open.max(close) + 1.0,
                        low: open.min(close) - 1.0,
                        close,
                        volume: if i >= 37 { 3000.0 } else { 1000.0 },
                    }
                })
                .collect())
        }
    }

    #[test]
    fn repeated_signal_is_logged_once() {
        let source: &dyn MarketDataSource = &RallySource;
        let mut session =
            AnalysisSession::new(runner(), InMemorySignalStore::default()).with_ttl(Duration::ZERO);
        let loader = DataLoader::new(Some(source), session.runner().load_options());

        let first = session.analyze(&loader, "SOL", Timeframe::M5, false).unwrap();
        assert_eq!(first.report.scalp.action, ScalpAction::Long);
        assert_eq!(session.stats().signals, 1);

        // zero TTL forces a fresh analysis of the same bars
        session.analyze(&loader, "SOL", Timeframe::M5, false).unwrap();
        let stats = session.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.signals, 1);
        assert_eq!(session.store().recent("SOL", 10).len(), 1);
    }

    #[test]
    fn expired_entries_are_pruned_on_insert() {
        let source = SyntheticSource::default();
        let source: &dyn MarketDataSource = &source;
        let mut session =
            AnalysisSession::new(runner(), InMemorySignalStore::default()).with_ttl(Duration::ZERO);
        let loader = DataLoader::new(Some(source), session.runner().load_options());

        for symbol in ["BTC", "ETH", "SOL", "ADA"] {
            session.analyze(&loader, symbol, Timeframe::M5, false).unwrap();
        }
        assert_eq!(session.stats().cached, 1);
    }

    #[test]
    fn invalidate_drops_symbol_entries() {
        let source = SyntheticSource::default();
        let source: &dyn MarketDataSource = &source;
        let mut session = AnalysisSession::new(runner(), InMemorySignalStore::default());
        let loader = DataLoader::new(Some(source), session.runner().load_options());

        session.analyze(&loader, "BTC", Timeframe::M5, false).unwrap();
        session.analyze(&loader, "ETH", Timeframe::M5, false).unwrap();
        session.invalidate("BTC");
        assert_eq!(session.stats().cached, 1);
        session.clear();
        assert_eq!(session.stats().cached, 0);
        assert!(session.into_store().len() <= 2);
    }
}
