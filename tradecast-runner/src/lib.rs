//! Tradecast Runner — batch orchestration, replay batches, metrics, artifacts.
//!
//! This crate builds on `tradecast-core` to provide:
//! - TOML configuration with validation and CLI overrides
//! - Bounded-concurrency signal batches with ordered, per-asset results
//! - Replay batches that fetch intraday bars and run the simulator
//! - Outcome summaries and timestamped CSV/JSON artifacts

pub mod backtest;
pub mod config;
pub mod export;
pub mod metrics;
pub mod orchestrator;

pub use backtest::BacktestRunner;
pub use config::{
    BacktestConfig, ConfigError, OutputConfig, ServiceConfig, SignalsConfig, TradecastConfig,
};
pub use export::{
    hash_file, load_summary, save_backtest_run, save_signal_run, BacktestArtifacts,
    BacktestSummary,
};
pub use metrics::OutcomeSummary;
pub use orchestrator::{
    BatchError, BatchOrchestrator, BatchReport, BatchTally, DEFAULT_MAX_CONCURRENCY,
};
