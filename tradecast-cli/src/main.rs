//! Tradecast CLI — signal batches, replays, single predictions, universes.
//!
//! Commands:
//! - `signals` — sample a universe, fetch predictions, write a signal table
//! - `backtest` — replay a signal table over intraday bars
//! - `predict` — run the pipeline for one asset and print the outcome
//! - `universe fetch` — download the NSE equity list as a universe file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tradecast_core::domain::{SignalOutcome, TradeOutcome};
use tradecast_core::market::{CsvBarProvider, MarketData, YahooProvider};
use tradecast_core::prediction::{HttpPredictionClient, PredictionService};
use tradecast_core::signal::SignalAggregator;
use tradecast_core::table::load_signals;
use tradecast_core::universe::{Universe, NSE_SUFFIX};
use tradecast_runner::{
    hash_file, save_backtest_run, save_signal_run, BacktestRunner, BacktestSummary,
    BatchOrchestrator, OutcomeSummary, TradecastConfig,
};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "tradecast.toml";

#[derive(Parser)]
#[command(
    name = "tradecast",
    about = "Tradecast CLI — model-driven trade signals and intraday replays"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate signals for a sample of the universe and save them as CSV.
    Signals {
        /// Path to a TOML config file. Defaults to ./tradecast.toml if present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Universe file: one asset per line, or an equity-list CSV with a SYMBOL column.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Explicit assets (e.g. SBIN.NS,TCS.NS). Skips universe loading and sampling.
        #[arg(long, value_delimiter = ',')]
        assets: Vec<String>,

        /// Number of assets to sample.
        #[arg(long)]
        sample: Option<usize>,

        /// Seed for reproducible sampling.
        #[arg(long)]
        seed: Option<u64>,

        /// Stop distance as a multiple of the target distance.
        #[arg(long)]
        risk_ratio: Option<f64>,

        /// Maximum assets in flight.
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Prediction service endpoint.
        #[arg(long)]
        url: Option<String>,

        /// Read prices from `<dir>/<ASSET>.csv` instead of Yahoo Finance.
        #[arg(long)]
        prices_dir: Option<PathBuf>,

        /// Output directory for the signal table.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Replay a saved signal table over intraday bars.
    Backtest {
        /// Signal table written by `signals`.
        #[arg(long)]
        signals: PathBuf,

        /// Path to a TOML config file. Defaults to ./tradecast.toml if present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of leading bars in which the entry may fill.
        #[arg(long)]
        window: Option<usize>,

        /// Entry tolerance around the signal price, in percent.
        #[arg(long)]
        tolerance: Option<f64>,

        /// Bar interval (e.g. 1m, 5m).
        #[arg(long)]
        interval: Option<String>,

        /// Lookback range (e.g. 1d, 5d).
        #[arg(long)]
        range: Option<String>,

        /// Maximum replays in flight.
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Read bars from `<dir>/<ASSET>.csv` instead of Yahoo Finance.
        #[arg(long)]
        prices_dir: Option<PathBuf>,

        /// Output directory for the performance tape and summary.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run the signal pipeline for a single asset and print the outcome.
    Predict {
        /// Asset id (e.g. RELIANCE.NS).
        asset: String,

        /// Path to a TOML config file. Defaults to ./tradecast.toml if present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop distance as a multiple of the target distance.
        #[arg(long)]
        risk_ratio: Option<f64>,

        /// Prediction service endpoint.
        #[arg(long)]
        url: Option<String>,

        /// Read prices from `<dir>/<ASSET>.csv` instead of Yahoo Finance.
        #[arg(long)]
        prices_dir: Option<PathBuf>,
    },
    /// Universe management commands.
    Universe {
        #[command(subcommand)]
        action: UniverseAction,
    },
}

#[derive(Subcommand)]
enum UniverseAction {
    /// Download the NSE equity list and write it as a universe file.
    Fetch {
        /// Destination file.
        #[arg(long, default_value = "universe.txt")]
        out: PathBuf,

        /// Download timeout in seconds.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    match cli.command {
        Commands::Signals {
            config,
            universe,
            assets,
            sample,
            seed,
            risk_ratio,
            max_concurrency,
            url,
            prices_dir,
            output_dir,
        } => {
            let config = load_config(config.as_deref())?
                .with_sample_size(sample)
                .with_seed(seed)
                .with_risk_ratio(risk_ratio)
                .with_max_concurrency(max_concurrency)
                .with_service_url(url)
                .with_output_dir(output_dir);
            config.validate()?;
            run_signals(&config, universe.as_deref(), assets, prices_dir)
        }
        Commands::Backtest {
            signals,
            config,
            window,
            tolerance,
            interval,
            range,
            max_concurrency,
            prices_dir,
            output_dir,
        } => {
            let mut config = load_config(config.as_deref())?
                .with_entry_window(window)
                .with_entry_tolerance(tolerance)
                .with_max_concurrency(max_concurrency)
                .with_output_dir(output_dir);
            if let Some(interval) = interval {
                config.backtest.interval = interval;
            }
            if let Some(range) = range {
                config.backtest.range = range;
            }
            config.validate()?;
            run_backtest(&config, &signals, prices_dir)
        }
        Commands::Predict {
            asset,
            config,
            risk_ratio,
            url,
            prices_dir,
        } => {
            let config = load_config(config.as_deref())?
                .with_risk_ratio(risk_ratio)
                .with_service_url(url);
            config.validate()?;
            run_predict(&config, &asset, prices_dir)
        }
        Commands::Universe { action } => match action {
            UniverseAction::Fetch { out, timeout_secs } => run_universe_fetch(&out, timeout_secs),
        },
    }
}

fn setup_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<TradecastConfig> {
    match path {
        Some(path) => Ok(TradecastConfig::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!(path = DEFAULT_CONFIG_FILE, "using config from working directory");
            Ok(TradecastConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?)
        }
        None => Ok(TradecastConfig::default()),
    }
}

fn market_source(config: &TradecastConfig, prices_dir: Option<PathBuf>) -> Result<Box<dyn MarketData>> {
    Ok(match prices_dir {
        Some(dir) => Box::new(CsvBarProvider::new(dir)),
        None => Box::new(YahooProvider::new(
            config.service.timeout(),
            config.service.max_retries,
        )?),
    })
}

fn prediction_client(config: &TradecastConfig) -> Result<HttpPredictionClient> {
    HttpPredictionClient::new(
        config.service.url.clone(),
        config.service.timeout(),
        config.service.max_retries,
    )
    .context("failed to set up prediction client")
}

fn resolve_assets(
    config: &TradecastConfig,
    universe_path: Option<&Path>,
    explicit: Vec<String>,
) -> Result<Vec<String>> {
    if !explicit.is_empty() {
        return Ok(Universe::new(explicit).assets().to_vec());
    }
    let universe = match universe_path {
        Some(path) => Universe::from_file(path, NSE_SUFFIX)
            .with_context(|| format!("failed to load universe {}", path.display()))?,
        None => {
            info!("no universe file given, downloading the NSE equity list");
            Universe::fetch_nse(config.service.timeout())?
        }
    };
    let picked = match config.signals.sample_size {
        Some(n) => universe.sample(n, config.signals.seed),
        None => universe.assets().to_vec(),
    };
    info!(universe = universe.len(), picked = picked.len(), "resolved assets");
    Ok(picked)
}

fn run_signals(
    config: &TradecastConfig,
    universe_path: Option<&Path>,
    explicit: Vec<String>,
    prices_dir: Option<PathBuf>,
) -> Result<()> {
    let assets = resolve_assets(config, universe_path, explicit)?;
    let client = prediction_client(config)?;
    let market = market_source(config, prices_dir)?;

    let report = BatchOrchestrator::new(
        &client,
        &*market,
        SignalAggregator::new(config.signals.risk_ratio),
    )
    .with_threshold(config.signals.threshold)
    .with_max_concurrency(config.signals.max_concurrency)
    .run(&assets)?;

    print_signals(&report.outcomes);

    let tally = report.tally();
    println!(
        "\n{} full, {} partial, {} failed of {}",
        tally.full,
        tally.partial,
        tally.failed,
        report.len()
    );
    if report.successful().is_empty() {
        warn!("no asset produced a signal; nothing to save");
        return Ok(());
    }

    let (path, rows) = save_signal_run(&report.outcomes, &config.output.dir)?;
    println!("Saved {rows} signals to: {}", path.display());
    Ok(())
}

fn run_backtest(config: &TradecastConfig, signals_path: &Path, prices_dir: Option<PathBuf>) -> Result<()> {
    let loaded = load_signals(signals_path)
        .with_context(|| format!("failed to load signal table {}", signals_path.display()))?;
    for skipped in &loaded.skipped {
        info!(
            line = skipped.line,
            asset = %skipped.asset_id,
            reason = %skipped.reason,
            "skipping row"
        );
    }
    if loaded.signals.is_empty() {
        bail!(
            "{} has no fully priced signals ({} rows skipped)",
            signals_path.display(),
            loaded.skipped.len()
        );
    }

    let market = market_source(config, prices_dir)?;
    let runner = BacktestRunner::new(
        &*market,
        config.backtest.bar_query(),
        config.backtest.replay_params(),
    )
    .with_max_concurrency(config.signals.max_concurrency);
    let outcomes = runner.run(&loaded.signals)?;

    print_outcomes(&outcomes);
    let summary = OutcomeSummary::compute(&outcomes);
    print_summary(&summary);

    let meta = BacktestSummary::new(
        Some(signals_path),
        hash_file(signals_path)?,
        loaded.skipped.len(),
        config.backtest.bar_query(),
        config.backtest.replay_params(),
        summary,
    );
    let artifacts = save_backtest_run(&outcomes, &meta, &config.output.dir)?;
    println!("Performance saved to: {}", artifacts.outcomes_csv.display());
    println!("Summary saved to: {}", artifacts.summary_json.display());
    Ok(())
}

fn run_predict(config: &TradecastConfig, asset: &str, prices_dir: Option<PathBuf>) -> Result<()> {
    let client = prediction_client(config)?;
    let market = market_source(config, prices_dir)?;
    info!(asset, service = client.name(), "requesting prediction");

    let outcome = BatchOrchestrator::new(
        &client,
        &*market,
        SignalAggregator::new(config.signals.risk_ratio),
    )
    .with_threshold(config.signals.threshold)
    .process_asset(asset);

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let SignalOutcome::Failed(failure) = &outcome {
        bail!("prediction for {} failed: {}", failure.asset_id, failure.error);
    }
    Ok(())
}

fn run_universe_fetch(out: &Path, timeout_secs: u64) -> Result<()> {
    let universe = Universe::fetch_nse(std::time::Duration::from_secs(timeout_secs))?;
    std::fs::write(out, universe.to_lines())
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("Wrote {} assets to: {}", universe.len(), out.display());
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".into())
}

fn print_signals(outcomes: &[SignalOutcome]) {
    println!(
        "\n{:<16} {:<6} {:>6} {:>8} {:<10} {:>10} {:>10} {:>10}  {}",
        "Asset", "Type", "Prob", "Change%", "Confidence", "Price", "Target", "Stop", "Status"
    );
    println!("{}", "-".repeat(100));
    for outcome in outcomes {
        match outcome {
            SignalOutcome::Full(s) => println!(
                "{:<16} {:<6} {:>6.3} {:>8.2} {:<10} {:>10.2} {:>10.2} {:>10.2}  full",
                s.asset_id,
                s.trade_type.to_string(),
                s.probability,
                s.predicted_change_pct,
                s.confidence.to_string(),
                s.current_price,
                s.target_price,
                s.stop_loss_price
            ),
            SignalOutcome::Partial(p) => println!(
                "{:<16} {:<6} {:>6.3} {:>8} {:<10} {:>10} {:>10} {:>10}  partial: {}",
                p.asset_id,
                p.trade_type.to_string(),
                p.probability,
                fmt_opt(p.predicted_change_pct),
                p.confidence.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                "-",
                "-",
                "-",
                p.reason
            ),
            SignalOutcome::Failed(f) => {
                println!("{:<16} {:<80}  failed: {}", f.asset_id, "", f.error)
            }
        }
    }
}

fn print_outcomes(outcomes: &[TradeOutcome]) {
    println!(
        "\n{:<16} {:<6} {:>10} {:>10} {:<13} {:>9}",
        "Asset", "Type", "Entry", "Exit", "Result", "PnL"
    );
    println!("{}", "-".repeat(70));
    for o in outcomes {
        println!(
            "{:<16} {:<6} {:>10} {:>10} {:<13} {:>9.2}{}",
            o.asset_id,
            o.trade_type.to_string(),
            fmt_opt(o.entry_price),
            fmt_opt(o.exit_price),
            o.result.as_str(),
            o.pnl,
            o.note
                .as_ref()
                .map(|n| format!("  ({n})"))
                .unwrap_or_default()
        );
    }
}

fn print_summary(s: &OutcomeSummary) {
    println!("\n=== Replay Summary ===");
    println!("Signals:       {}", s.total);
    println!("Executed:      {}", s.executed);
    println!(
        "Target/Stop/Timeout: {}/{}/{}",
        s.targets, s.stop_losses, s.timeouts
    );
    println!("Not executed:  {}", s.not_executed);
    println!("Win rate:      {:.1}%", s.win_rate * 100.0);
    println!("Total PnL:     {:.2}", s.total_pnl);
    println!("Avg PnL:       {:.2}", s.avg_pnl);
    println!("Profit factor: {:.2}", s.profit_factor);
}
