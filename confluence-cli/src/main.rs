//! Confluence CLI: analyze symbols and inspect configuration.
//!
//! Commands:
//! - `analyze`: run the confluence pipeline for one or more symbols,
//!   optionally across the timeframe hierarchy, and print text or JSON
//! - `defaults`: print the default run configuration as TOML

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use confluence_core::data::MarketDataSource;
use confluence_core::domain::Timeframe;
use confluence_runner::{
    AnalysisSession, CsvSource, DataLoader, InMemorySignalStore, JsonlSignalStore, RunConfig, Runner,
    SignalStore, SymbolAnalysis,
};

#[derive(Parser)]
#[command(
    name = "confluence",
    about = "Confluence CLI: multi-indicator signal confluence engine"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze symbols on one interval.
    Analyze {
        /// Symbols to analyze (e.g., BTCUSDT ETHUSDT).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Bar interval: 1m, 5m, 15m, 1h, 4h, 1d, ...
        #[arg(long, short, default_value = "1h")]
        interval: Timeframe,

        /// Path to a TOML run configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory of `{SYMBOL}_{interval}.csv` files. Overrides the config.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Use synthetic data when no CSV is available.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Also aggregate across the interval's timeframe hierarchy.
        #[arg(long, default_value_t = false)]
        mtf: bool,

        /// Print JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the default configuration as TOML.
    Defaults,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            symbols,
            interval,
            config,
            data_dir,
            synthetic,
            mtf,
            json,
        } => run_analyze(symbols, interval, config, data_dir, synthetic, mtf, json),
        Commands::Defaults => {
            print!("{}", RunConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run_analyze(
    symbols: Vec<String>,
    interval: Timeframe,
    config_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    synthetic: bool,
    mtf: bool,
    json: bool,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data.dir = dir;
    }
    if synthetic {
        config.data.synthetic_fallback = true;
    }
    if !config.data.synthetic_fallback && !config.data.dir.is_dir() {
        bail!(
            "data directory {} does not exist (pass --data-dir or --synthetic)",
            config.data.dir.display()
        );
    }

    let source_dir = config.data.dir.clone();
    let source = CsvSource::new(&source_dir);
    let signal_log = config.session.signal_log.clone();
    let cooldown = chrono::Duration::seconds(config.session.signal_cooldown_secs);
    let runner = Runner::new(config).context("invalid configuration")?;
    debug!(config_hash = runner.config_hash(), data_dir = %source_dir.display(), "runner ready");
    let loader = DataLoader::new(Some(&source as &dyn MarketDataSource), runner.load_options());

    let analyses = match signal_log {
        Some(path) => {
            let store = JsonlSignalStore::open(path.clone(), cooldown)
                .with_context(|| format!("failed to open signal log {}", path.display()))?;
            analyze_all(AnalysisSession::new(runner, store), &loader, &symbols, interval, mtf)?
        }
        None => analyze_all(
            AnalysisSession::new(runner, InMemorySignalStore::new(cooldown)),
            &loader,
            &symbols,
            interval,
            mtf,
        )?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&analyses)?);
    } else {
        for analysis in &analyses {
            print_summary(analysis);
        }
    }
    Ok(())
}

fn analyze_all<S: SignalStore>(
    mut session: AnalysisSession<S>,
    loader: &DataLoader<'_>,
    symbols: &[String],
    interval: Timeframe,
    mtf: bool,
) -> Result<Vec<SymbolAnalysis>> {
    let mut analyses = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let analysis = session
            .analyze(loader, symbol, interval, mtf)
            .with_context(|| format!("analysis failed for {symbol} {interval}"))?;
        analyses.push(analysis);
    }
    Ok(analyses)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn print_summary(analysis: &SymbolAnalysis) {
    let r = &analysis.report;
    println!("=== {} {} ===", analysis.symbol, analysis.interval);
    if analysis.origin == confluence_runner::DataOrigin::Synthetic {
        println!("(synthetic data)");
    }
    println!("Price:        {:.4} at {}", r.price, r.as_of);
    println!("Bars:         {} (warm-up {})", r.bar_count, r.warmup_bars);
    println!(
        "Bias:         {} strength {:.0}% ({}/{} pairs)",
        r.bias.direction, r.bias.strength, r.bias.aligned_count, r.bias.total_pairs
    );
    for avg in &r.averages {
        println!("  EMA {:<4}    {}", avg.period, fmt_opt(avg.value));
    }
    println!(
        "RSI:          {:.1}{}",
        r.oscillators.relative_strength,
        if r.oscillators.relative_strength_ready { "" } else { " (warming up)" }
    );
    println!(
        "MACD:         {} / {}",
        fmt_opt(r.oscillators.macd_line),
        fmt_opt(r.oscillators.signal_line)
    );
    println!(
        "Gaps:         {} total, {} unfilled, signal {:?} ({:.0})",
        r.gaps.gaps.len(),
        r.gaps.unfilled().count(),
        r.gaps.signal.primary,
        r.gaps.signal.strength
    );
    println!(
        "Structure:    {:?} score {:.0}, breakout {:.0}% ({:?})",
        r.structure.trend.direction,
        r.structure.trend.score,
        r.structure.breakout.probability,
        r.structure.breakout.horizon
    );
    println!(
        "Scalp:        {} confidence {:.0} ({:?}), hold {}",
        r.scalp.action, r.scalp.confidence, r.scalp.quality, r.scalp.hold_time_hint
    );
    println!(
        "Confluence:   {:.1} {:?} ({})",
        r.confluence.value, r.confluence.label, r.confluence.bias
    );
    println!(
        "Risk:         {:?} entry {:.4} stop {:.4} ({:?}, {:.2}%)",
        r.risk.side, r.risk.entry, r.risk.stop_loss.price, r.risk.stop_loss.method, r.risk.stop_loss.risk_pct
    );
    for tp in &r.risk.take_profits {
        println!(
            "  target      {:.4}  {:.2}R  close {:.0}%",
            tp.price, tp.rr_ratio, tp.close_pct
        );
    }
    println!(
        "              {:?} profile, {:.1}% max risk, grade {:?}",
        r.risk.risk_profile, r.risk.max_risk_pct, r.risk.grade
    );
    if let Some(mtf) = &r.multi_timeframe {
        println!(
            "Timeframes:   {} confluence {:.0}% ({:?}), {}",
            mtf.trend_direction, mtf.confluence_score, mtf.signal_strength, mtf.recommendation
        );
        for result in &mtf.results {
            println!(
                "  {:<4}        {} {:.0}% weight {:.2}",
                result.timeframe, result.bias, result.strength, result.weight
            );
        }
        for failure in &mtf.failures {
            println!("  {:<4}        failed: {}", failure.timeframe, failure.reason);
        }
    }
    println!(
        "Composite:    {:.1} (x{:.1})",
        r.composite.value, r.composite.quality_multiplier
    );
    println!();
}
