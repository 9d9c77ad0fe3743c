//! PredictionResponse — the validated view of one prediction service reply.

use serde::{Deserialize, Serialize};

/// Direction and volatility forecast for one asset.
///
/// Built only by the prediction client after boundary validation, so
/// `direction_probability` is always finite and inside `[0, 1]`. Every other
/// forecast field is independently optional: absence is a distinct state,
/// never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub asset_id: String,
    pub direction_probability: f64,
    pub predicted_change_pct: Option<f64>,
    pub predicted_variance: Option<f64>,
    pub model_aic: Option<f64>,
    pub qlike_score: Option<f64>,
    pub last_observed_date: Option<String>,
}

impl PredictionResponse {
    /// Minimal response carrying only a direction probability.
    pub fn direction_only(asset_id: impl Into<String>, probability: f64) -> Self {
        Self {
            asset_id: asset_id.into(),
            direction_probability: probability,
            predicted_change_pct: None,
            predicted_variance: None,
            model_aic: None,
            qlike_score: None,
            last_observed_date: None,
        }
    }

    pub fn has_valid_probability(&self) -> bool {
        self.direction_probability.is_finite() && (0.0..=1.0).contains(&self.direction_probability)
    }
}
