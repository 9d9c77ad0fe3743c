//! Run artifacts — timestamped signal tables, replay tapes and summaries.
//!
//! - Signal runs write `trades-<dd-mm-YYYY_HH-MM-SS>.csv`.
//! - Replay runs write `trade_performance-<stamp>.csv` plus a sibling
//!   `trade_performance-<stamp>.summary.json`.
//!
//! The summary records a BLAKE3 hash of the signal table it was replayed
//! from, so a performance file can be traced back to its exact input.
//! Persisted summaries carry a `schema_version`; newer versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tradecast_core::domain::{SignalOutcome, TradeOutcome};
use tradecast_core::market::BarQuery;
use tradecast_core::simulator::ReplayParams;
use tradecast_core::table::save_signals;

use crate::metrics::OutcomeSummary;

pub const SCHEMA_VERSION: u32 = 1;

const STAMP_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

/// Metadata written next to a replay tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub schema_version: u32,
    pub created_at: String,
    pub signals_file: Option<String>,
    /// BLAKE3 of the signal table bytes.
    pub signals_hash: String,
    pub skipped_rows: usize,
    pub query: BarQuery,
    pub params: ReplayParams,
    pub summary: OutcomeSummary,
}

impl BacktestSummary {
    pub fn new(
        signals_file: Option<&Path>,
        signals_hash: impl Into<String>,
        skipped_rows: usize,
        query: BarQuery,
        params: ReplayParams,
        summary: OutcomeSummary,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Local::now().to_rfc3339(),
            signals_file: signals_file.map(|p| p.display().to_string()),
            signals_hash: signals_hash.into(),
            skipped_rows,
            query,
            params,
            summary,
        }
    }
}

/// Paths written by a replay run.
#[derive(Debug, Clone)]
pub struct BacktestArtifacts {
    pub outcomes_csv: PathBuf,
    pub summary_json: PathBuf,
}

/// Hex BLAKE3 digest of a file's bytes.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

pub fn signals_filename(at: DateTime<Local>) -> String {
    format!("trades-{}.csv", at.format(STAMP_FORMAT))
}

pub fn performance_stem(at: DateTime<Local>) -> String {
    format!("trade_performance-{}", at.format(STAMP_FORMAT))
}

/// Write a signal table into `output_dir`. Returns the path and row count.
pub fn save_signal_run(outcomes: &[SignalOutcome], output_dir: &Path) -> Result<(PathBuf, usize)> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let path = output_dir.join(signals_filename(Local::now()));
    let rows = save_signals(&path, outcomes)
        .with_context(|| format!("failed to write signal table {}", path.display()))?;
    Ok((path, rows))
}

/// Render replay outcomes as CSV.
///
/// Columns: AssetId, Type, EntryPrice, EntryTime, ExitPrice, ExitTime,
/// Result, PnL, Note
pub fn export_outcomes_csv(outcomes: &[TradeOutcome]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "AssetId",
        "Type",
        "EntryPrice",
        "EntryTime",
        "ExitPrice",
        "ExitTime",
        "Result",
        "PnL",
        "Note",
    ])?;

    let price = |p: Option<f64>| p.map(|v| format!("{v:.4}")).unwrap_or_default();
    let time = |t: Option<DateTime<chrono::Utc>>| t.map(|v| v.to_rfc3339()).unwrap_or_default();

    for o in outcomes {
        let trade_type = o.trade_type.to_string();
        let note = o.note.as_ref().map(ToString::to_string).unwrap_or_default();
        let record: [&str; 9] = [
            &o.asset_id,
            &trade_type,
            &price(o.entry_price),
            &time(o.entry_time),
            &price(o.exit_price),
            &time(o.exit_time),
            o.result.as_str(),
            &format!("{:.4}", o.pnl),
            &note,
        ];
        wtr.write_record(record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the replay tape and its summary into `output_dir`.
pub fn save_backtest_run(
    outcomes: &[TradeOutcome],
    summary: &BacktestSummary,
    output_dir: &Path,
) -> Result<BacktestArtifacts> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let stem = performance_stem(Local::now());

    let outcomes_csv = output_dir.join(format!("{stem}.csv"));
    std::fs::write(&outcomes_csv, export_outcomes_csv(outcomes)?)
        .with_context(|| format!("failed to write {}", outcomes_csv.display()))?;

    let summary_json = output_dir.join(format!("{stem}.summary.json"));
    let json =
        serde_json::to_string_pretty(summary).context("failed to serialize backtest summary")?;
    std::fs::write(&summary_json, json)
        .with_context(|| format!("failed to write {}", summary_json.display()))?;

    Ok(BacktestArtifacts {
        outcomes_csv,
        summary_json,
    })
}

/// Load a summary written by `save_backtest_run`.
pub fn load_summary(path: &Path) -> Result<BacktestSummary> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let summary: BacktestSummary =
        serde_json::from_str(&json).context("failed to deserialize backtest summary")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}
