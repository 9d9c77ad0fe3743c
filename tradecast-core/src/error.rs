//! Per-asset error taxonomy shared by signal generation and replay.
//!
//! These values travel inside `AssetFailure` and `TradeOutcome`, so they are
//! plain data (`Clone`, serializable) rather than wrapped I/O errors. Transport
//! level detail is flattened into the message string at the boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single asset could not be carried all the way through the pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    /// Empty or missing price series.
    #[error("data unavailable: {reason}")]
    DataUnavailable { reason: String },

    /// Bad status or malformed response from the prediction service.
    #[error("prediction service error: {reason}")]
    ServiceError { reason: String },

    /// Predicted change is below the tradeable floor.
    #[error("predicted change {change:.3}% is below the {floor}% floor")]
    InsufficientSignal { change: f64, floor: f64 },

    /// Persisted signal table is missing a required column.
    #[error("signal table is missing required column '{column}'")]
    SchemaMismatch { column: String },

    /// Too few bars after entry to apply the timeout exit offset.
    #[error("sequence too short: {bars} bars after entry, timeout exit needs {required}")]
    SequenceTooShort { bars: usize, required: usize },
}

impl PipelineError {
    pub fn data_unavailable(reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            reason: reason.into(),
        }
    }

    pub fn service(reason: impl Into<String>) -> Self {
        Self::ServiceError {
            reason: reason.into(),
        }
    }

    /// Short machine-friendly label, used in CSV exports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::ServiceError { .. } => "service_error",
            Self::InsufficientSignal { .. } => "insufficient_signal",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::SequenceTooShort { .. } => "sequence_too_short",
        }
    }
}
