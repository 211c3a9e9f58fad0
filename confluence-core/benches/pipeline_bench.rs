//! Criterion benchmarks for the analysis hot paths.
//!
//! Benchmarks:
//! 1. Full single-timeframe pipeline at several history lengths
//! 2. Average series computation for the default period set
//! 3. Fair value gap scan
//! 4. Market structure analysis

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use confluence_core::components::{analyze_structure, compute_averages, detect_gaps};
use confluence_core::config::{EngineConfig, GapConfig, StructureConfig};
use confluence_core::domain::{closes, Bar, Timeframe};
use confluence_core::ConfluenceEngine;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0 + i as f64 * 0.02;
            let open = close - 0.3;
            Bar::new(
                base + chrono::Duration::minutes(15 * i as i64),
                open,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000.0 + (i % 500) as f64 * 1_000.0,
            )
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_pipeline(c: &mut Criterion) {
    let engine = ConfluenceEngine::new(EngineConfig::default()).unwrap();
    let mut group = c.benchmark_group("pipeline");
    for n in [300usize, 1_000, 5_000] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::new("analyze", n), &bars, |b, bars| {
            b.iter(|| engine.analyze(black_box(bars), Timeframe::M15).unwrap())
        });
    }
    group.finish();
}

fn bench_averages(c: &mut Criterion) {
    let bars = make_bars(5_000);
    let closes = closes(&bars);
    let periods = EngineConfig::default().averages.periods;
    c.bench_function("averages_default_periods_5000", |b| {
        b.iter(|| compute_averages(black_box(&closes), black_box(&periods)))
    });
}

fn bench_gaps(c: &mut Criterion) {
    let bars = make_bars(5_000);
    let config = GapConfig::default();
    c.bench_function("gap_scan_5000", |b| {
        b.iter(|| detect_gaps(black_box(&bars), &config))
    });
}

fn bench_structure(c: &mut Criterion) {
    let bars = make_bars(5_000);
    let averages = compute_averages(&closes(&bars), &EngineConfig::default().averages.periods);
    let config = StructureConfig::default();
    c.bench_function("structure_5000", |b| {
        b.iter(|| analyze_structure(black_box(&bars), &averages, &config))
    });
}

criterion_group!(
    benches,
    bench_pipeline,
    bench_averages,
    bench_gaps,
    bench_structure
);
criterion_main!(benches);
