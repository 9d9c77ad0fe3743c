//! Persisted signal table — the hand-off between signal generation and replay.
//!
//! Fixed, case-sensitive column contract:
//!
//! `AssetId, Type, Probability, PredictedChange, PredictedVariance,
//! Confidence, CurrentPrice, TargetPrice, StopLossPrice, ModelAic`
//!
//! Partial signals are written with empty cells for the fields they lack.
//! On load, a missing column rejects the whole table; rows that cannot form a
//! fully priced signal are skipped and reported, never zero-filled.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{Confidence, SignalOutcome, TradeSignal, TradeType};
use crate::error::PipelineError;

/// Required columns, in write order.
pub const SIGNAL_COLUMNS: [&str; 10] = [
    "AssetId",
    "Type",
    "Probability",
    "PredictedChange",
    "PredictedVariance",
    "Confidence",
    "CurrentPrice",
    "TargetPrice",
    "StopLossPrice",
    "ModelAic",
];

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Schema(PipelineError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One table row. Every cell except the asset id may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    #[serde(rename = "AssetId")]
    pub asset_id: String,
    #[serde(rename = "Type")]
    pub trade_type: Option<String>,
    #[serde(rename = "Probability")]
    pub probability: Option<f64>,
    #[serde(rename = "PredictedChange")]
    pub predicted_change: Option<f64>,
    #[serde(rename = "PredictedVariance")]
    pub predicted_variance: Option<f64>,
    #[serde(rename = "Confidence")]
    pub confidence: Option<String>,
    #[serde(rename = "CurrentPrice")]
    pub current_price: Option<f64>,
    #[serde(rename = "TargetPrice")]
    pub target_price: Option<f64>,
    #[serde(rename = "StopLossPrice")]
    pub stop_loss_price: Option<f64>,
    #[serde(rename = "ModelAic")]
    pub model_aic: Option<f64>,
}

impl SignalRow {
    /// Row for a full or partial signal; failures have no row.
    pub fn from_outcome(outcome: &SignalOutcome) -> Option<Self> {
        match outcome {
            SignalOutcome::Full(s) => Some(Self {
                asset_id: s.asset_id.clone(),
                trade_type: Some(s.trade_type.to_string()),
                probability: Some(s.probability),
                predicted_change: Some(s.predicted_change_pct),
                predicted_variance: s.predicted_variance,
                confidence: Some(s.confidence.to_string()),
                current_price: Some(s.current_price),
                target_price: Some(s.target_price),
                stop_loss_price: Some(s.stop_loss_price),
                model_aic: s.model_aic,
            }),
            SignalOutcome::Partial(p) => Some(Self {
                asset_id: p.asset_id.clone(),
                trade_type: Some(p.trade_type.to_string()),
                probability: Some(p.probability),
                predicted_change: p.predicted_change_pct,
                predicted_variance: p.predicted_variance,
                confidence: p.confidence.map(|c| c.to_string()),
                current_price: None,
                target_price: None,
                stop_loss_price: None,
                model_aic: p.model_aic,
            }),
            SignalOutcome::Failed(_) => None,
        }
    }

    /// Rebuild a priced signal, or say which cell is missing or invalid.
    ///
    /// Prices must be finite, positive and ordered for the trade direction.
    pub fn to_signal(&self) -> Result<TradeSignal, String> {
        fn need<T: Copy>(value: Option<T>, column: &str) -> Result<T, String> {
            value.ok_or_else(|| format!("empty {column}"))
        }

        fn price(value: Option<f64>, column: &str) -> Result<f64, String> {
            let v = need(value, column)?;
            if v.is_finite() && v > 0.0 {
                Ok(v)
            } else {
                Err(format!("{column} {v} is not a positive price"))
            }
        }

        let trade_type: TradeType = self
            .trade_type
            .as_deref()
            .ok_or_else(|| "empty Type".to_string())?
            .parse()
            .map_err(|e| format!("{e}"))?;
        let confidence: Confidence = self
            .confidence
            .as_deref()
            .ok_or_else(|| "empty Confidence".to_string())?
            .parse()
            .map_err(|e| format!("{e}"))?;

        let probability = need(self.probability, "Probability")?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(format!("Probability {probability} outside [0, 1]"));
        }

        let signal = TradeSignal {
            asset_id: self.asset_id.clone(),
            trade_type,
            probability,
            predicted_change_pct: need(self.predicted_change, "PredictedChange")?,
            predicted_variance: self.predicted_variance,
            confidence,
            current_price: price(self.current_price, "CurrentPrice")?,
            target_price: price(self.target_price, "TargetPrice")?,
            stop_loss_price: price(self.stop_loss_price, "StopLossPrice")?,
            model_aic: self.model_aic,
        };
        if !signal.prices_ordered() {
            return Err(format!(
                "prices out of order for {}: target {}, current {}, stop {}",
                signal.trade_type, signal.target_price, signal.current_price, signal.stop_loss_price
            ));
        }
        Ok(signal)
    }
}

/// A row that did not yield a replayable signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: u64,
    pub asset_id: String,
    pub reason: String,
}

/// Result of loading a table for replay.
#[derive(Debug, Default)]
pub struct LoadedSignals {
    pub signals: Vec<TradeSignal>,
    pub skipped: Vec<SkippedRow>,
}

/// Write full and partial outcomes; returns the number of rows written.
pub fn write_signals<W: io::Write>(writer: W, outcomes: &[SignalOutcome]) -> Result<usize, TableError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(SIGNAL_COLUMNS)?;

    let mut written = 0;
    for row in outcomes.iter().filter_map(SignalRow::from_outcome) {
        wtr.serialize(&row)?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

/// Write a table to `path`, creating or truncating it.
pub fn save_signals(path: &Path, outcomes: &[SignalOutcome]) -> Result<usize, TableError> {
    let file = std::fs::File::create(path)?;
    write_signals(file, outcomes)
}

/// Check that every required column is present by exact name.
pub fn validate_headers(headers: &csv::StringRecord) -> Result<(), TableError> {
    for column in SIGNAL_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(TableError::Schema(PipelineError::SchemaMismatch {
                column: column.to_string(),
            }));
        }
    }
    for extra in headers.iter().filter(|h| !SIGNAL_COLUMNS.contains(h)) {
        warn!(column = extra, "ignoring unknown signal table column");
    }
    Ok(())
}

/// Read a table, keeping only rows that form fully priced signals.
pub fn read_signals<R: io::Read>(reader: R) -> Result<LoadedSignals, TableError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    validate_headers(&headers)?;

    let mut loaded = LoadedSignals::default();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: SignalRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                loaded.skipped.push(SkippedRow {
                    line,
                    asset_id: record.get(0).unwrap_or_default().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        match row.to_signal() {
            Ok(signal) => loaded.signals.push(signal),
            Err(reason) => loaded.skipped.push(SkippedRow {
                line,
                asset_id: row.asset_id,
                reason,
            }),
        }
    }
    Ok(loaded)
}

/// Load a table from `path`.
pub fn load_signals(path: &Path) -> Result<LoadedSignals, TableError> {
    let file = std::fs::File::open(path)?;
    read_signals(file)
}
