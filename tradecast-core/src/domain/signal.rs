//! Trade signals — the tagged result of aggregating one prediction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PipelineError;

/// Direction of the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Long,
    Short,
}

impl TradeType {
    /// Long when the up-move probability is strictly above one half.
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.5 {
            Self::Long
        } else {
            Self::Short
        }
    }

    pub fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }

    /// Signed pnl of moving from `entry` to `exit` in this direction.
    pub fn pnl(self, entry: f64, exit: f64) -> f64 {
        match self {
            Self::Long => exit - entry,
            Self::Short => entry - exit,
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => f.write_str("Long"),
            Self::Short => f.write_str("Short"),
        }
    }
}

/// Unrecognised label in a persisted table cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised {field} label '{value}'")]
pub struct ParseLabelError {
    pub field: &'static str,
    pub value: String,
}

impl FromStr for TradeType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            _ => Err(ParseLabelError {
                field: "trade type",
                value: s.to_string(),
            }),
        }
    }
}

/// Discretised trust level of a signal.
///
/// Ordered: `Low < Medium < High < VeryHigh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        };
        f.write_str(label)
    }
}

impl FromStr for Confidence {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "veryhigh" => Ok(Self::VeryHigh),
            _ => Err(ParseLabelError {
                field: "confidence",
                value: s.to_string(),
            }),
        }
    }
}

/// A fully priced, immutable trade signal.
///
/// Price ordering: Long ⇒ `target > current > stop`; Short ⇒
/// `target < current < stop` (strict when change and risk ratio are positive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub asset_id: String,
    pub trade_type: TradeType,
    pub probability: f64,
    pub predicted_change_pct: f64,
    pub predicted_variance: Option<f64>,
    pub confidence: Confidence,
    pub current_price: f64,
    pub target_price: f64,
    pub stop_loss_price: f64,
    pub model_aic: Option<f64>,
}

impl TradeSignal {
    /// Check the directional price ordering.
    pub fn prices_ordered(&self) -> bool {
        match self.trade_type {
            TradeType::Long => {
                self.target_price > self.current_price && self.current_price > self.stop_loss_price
            }
            TradeType::Short => {
                self.target_price < self.current_price && self.current_price < self.stop_loss_price
            }
        }
    }
}

/// A signal that stopped short of pricing. Every unknown field is `None`;
/// prices are never filled with sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSignal {
    pub asset_id: String,
    pub trade_type: TradeType,
    pub probability: f64,
    pub predicted_change_pct: Option<f64>,
    pub predicted_variance: Option<f64>,
    pub confidence: Option<Confidence>,
    pub model_aic: Option<f64>,
    /// Why pricing was not reached.
    pub reason: PipelineError,
}

/// An asset that failed outright, correlated with its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub asset_id: String,
    pub error: PipelineError,
}

impl AssetFailure {
    pub fn new(asset_id: impl Into<String>, error: PipelineError) -> Self {
        Self {
            asset_id: asset_id.into(),
            error,
        }
    }
}

/// Exactly one of full, partial or failed for each asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalOutcome {
    Full(TradeSignal),
    Partial(PartialSignal),
    Failed(AssetFailure),
}

impl SignalOutcome {
    pub fn asset_id(&self) -> &str {
        match self {
            Self::Full(s) => &s.asset_id,
            Self::Partial(p) => &p.asset_id,
            Self::Failed(f) => &f.asset_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn full(&self) -> Option<&TradeSignal> {
        match self {
            Self::Full(s) => Some(s),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Full(_) => "full",
            Self::Partial(_) => "partial",
            Self::Failed(_) => "failed",
        }
    }
}
