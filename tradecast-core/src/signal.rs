//! Signal aggregation: prediction + risk ratio → priced trade signal.
//!
//! Policy, in order:
//! 1. Direction from the up-move probability (Long iff `p > 0.5`).
//! 2. No predicted change → partial (direction only).
//! 3. Predicted change below the 1.5% floor → partial, no prices.
//! 4. Confidence tier from QLIKE score and probability extremity.
//! 5. Current price from market data; unavailable → partial without prices.
//! 6. Target at the predicted change, stop at `change * risk_ratio`.

use tracing::debug;

use crate::domain::{
    AssetFailure, Confidence, PartialSignal, PredictionResponse, SignalOutcome, TradeSignal,
    TradeType,
};
use crate::error::PipelineError;
use crate::market::MarketData;

/// Smallest predicted move (percent) worth trading.
pub const MIN_PREDICTED_CHANGE_PCT: f64 = 1.5;

/// QLIKE scores at or above this are never trusted beyond `Low`.
pub const QLIKE_CEILING: f64 = 1.5;

/// Probability bands, most extreme first: (upper edge, lower edge, tier).
const CONFIDENCE_BANDS: [(f64, f64, Confidence); 3] = [
    (0.60, 0.40, Confidence::VeryHigh),
    (0.54, 0.46, Confidence::High),
    (0.52, 0.48, Confidence::Medium),
];

/// Tier a signal by volatility-model fit and direction extremity.
pub fn confidence_tier(probability: f64, qlike_score: Option<f64>) -> Confidence {
    let Some(qlike) = qlike_score else {
        return Confidence::Low;
    };
    if qlike >= QLIKE_CEILING {
        return Confidence::Low;
    }
    CONFIDENCE_BANDS
        .iter()
        .find(|(upper, lower, _)| probability > *upper || probability < *lower)
        .map(|(_, _, tier)| *tier)
        .unwrap_or(Confidence::Low)
}

/// Target and stop-loss prices for a move of `change_pct` percent.
///
/// Returns `(target, stop)`.
pub fn price_levels(
    trade_type: TradeType,
    current_price: f64,
    change_pct: f64,
    risk_ratio: f64,
) -> (f64, f64) {
    let target_pct = change_pct / 100.0;
    let stop_pct = target_pct * risk_ratio;
    match trade_type {
        TradeType::Long => (
            current_price * (1.0 + target_pct),
            current_price * (1.0 - stop_pct),
        ),
        TradeType::Short => (
            current_price * (1.0 - target_pct),
            current_price * (1.0 + stop_pct),
        ),
    }
}

/// Latest close as a usable current price.
pub fn current_price(market: &dyn MarketData, asset_id: &str) -> Result<f64, PipelineError> {
    match market.latest_close(asset_id) {
        Ok(Some(price)) if price.is_finite() && price > 0.0 => Ok(price),
        Ok(Some(price)) => Err(PipelineError::data_unavailable(format!(
            "unusable latest close {price}"
        ))),
        Ok(None) => Err(PipelineError::data_unavailable("no recent bars")),
        Err(e) => Err(PipelineError::data_unavailable(e.to_string())),
    }
}

/// Converts prediction responses into signals for a fixed risk ratio.
#[derive(Debug, Clone, Copy)]
pub struct SignalAggregator {
    risk_ratio: f64,
}

impl SignalAggregator {
    /// `risk_ratio` scales the stop distance relative to the target distance.
    pub fn new(risk_ratio: f64) -> Self {
        Self { risk_ratio }
    }

    pub fn risk_ratio(&self) -> f64 {
        self.risk_ratio
    }

    /// Aggregate, pulling the current price from `market` only when needed.
    pub fn aggregate(&self, response: &PredictionResponse, market: &dyn MarketData) -> SignalOutcome {
        self.aggregate_with(response, |asset| current_price(market, asset))
    }

    /// Aggregate with an explicit price lookup. `price_of` is called at most
    /// once, and only after the signal has passed the change floor.
    pub fn aggregate_with<F>(&self, response: &PredictionResponse, price_of: F) -> SignalOutcome
    where
        F: FnOnce(&str) -> Result<f64, PipelineError>,
    {
        let asset_id = response.asset_id.as_str();
        if !response.has_valid_probability() {
            return SignalOutcome::Failed(AssetFailure::new(
                asset_id,
                PipelineError::service(format!(
                    "direction probability {} is outside [0, 1]",
                    response.direction_probability
                )),
            ));
        }

        let probability = response.direction_probability;
        let trade_type = TradeType::from_probability(probability);

        let Some(change) = response.predicted_change_pct else {
            debug!(asset = asset_id, "no volatility forecast");
            return SignalOutcome::Partial(PartialSignal {
                asset_id: asset_id.to_string(),
                trade_type,
                probability,
                predicted_change_pct: None,
                predicted_variance: None,
                confidence: None,
                model_aic: None,
                reason: PipelineError::data_unavailable("volatility forecast missing"),
            });
        };

        if change < MIN_PREDICTED_CHANGE_PCT {
            debug!(asset = asset_id, change, "not enough room for trade");
            return SignalOutcome::Partial(PartialSignal {
                asset_id: asset_id.to_string(),
                trade_type,
                probability,
                predicted_change_pct: Some(change),
                predicted_variance: response.predicted_variance,
                confidence: None,
                model_aic: None,
                reason: PipelineError::InsufficientSignal {
                    change,
                    floor: MIN_PREDICTED_CHANGE_PCT,
                },
            });
        }

        let confidence = confidence_tier(probability, response.qlike_score);

        let current = match price_of(asset_id) {
            Ok(price) => price,
            Err(reason) => {
                debug!(asset = asset_id, %reason, "current price unavailable");
                return SignalOutcome::Partial(PartialSignal {
                    asset_id: asset_id.to_string(),
                    trade_type,
                    probability,
                    predicted_change_pct: Some(change),
                    predicted_variance: response.predicted_variance,
                    confidence: Some(confidence),
                    model_aic: response.model_aic,
                    reason,
                });
            }
        };

        let (target_price, stop_loss_price) =
            price_levels(trade_type, current, change, self.risk_ratio);

        SignalOutcome::Full(TradeSignal {
            asset_id: asset_id.to_string(),
            trade_type,
            probability,
            predicted_change_pct: change,
            predicted_variance: response.predicted_variance,
            confidence,
            current_price: current,
            target_price,
            stop_loss_price,
            model_aic: response.model_aic,
        })
    }
}
