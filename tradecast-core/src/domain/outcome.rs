//! TradeOutcome — the terminal result of replaying one signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::TradeType;
use crate::error::PipelineError;

/// How the simulated trade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeResult {
    Target,
    StopLoss,
    Timeout,
    NotExecuted,
}

impl TradeResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::StopLoss => "stop_loss",
            Self::Timeout => "timeout",
            Self::NotExecuted => "not_executed",
        }
    }
}

/// Result of one replay. Entry/exit fields are `None` when the trade was
/// never executed, and `pnl` is then exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub asset_id: String,
    pub trade_type: TradeType,
    pub entry_price: Option<f64>,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub result: TradeResult,
    pub pnl: f64,
    /// Anomaly observed during replay (no data, short timeout sequence).
    pub note: Option<PipelineError>,
}

impl TradeOutcome {
    pub fn not_executed(
        asset_id: impl Into<String>,
        trade_type: TradeType,
        note: Option<PipelineError>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            trade_type,
            entry_price: None,
            entry_time: None,
            exit_price: None,
            exit_time: None,
            result: TradeResult::NotExecuted,
            pnl: 0.0,
            note,
        }
    }

    pub fn is_executed(&self) -> bool {
        self.result != TradeResult::NotExecuted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_executed_has_no_fills() {
        let outcome = TradeOutcome::not_executed("SBIN.NS", TradeType::Long, None);
        assert!(!outcome.is_executed());
        assert_eq!(outcome.pnl, 0.0);
        assert!(outcome.entry_price.is_none());
        assert!(outcome.exit_time.is_none());
    }

    #[test]
    fn result_labels() {
        assert_eq!(TradeResult::StopLoss.as_str(), "stop_loss");
        assert_eq!(TradeResult::NotExecuted.as_str(), "not_executed");
    }
}
