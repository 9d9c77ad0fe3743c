//! Prediction service client.
//!
//! The `PredictionService` trait abstracts over the external direction and
//! volatility models so the batch layer can be driven by fakes in tests. The
//! HTTP implementation posts `{"ticker", "threshold"}` and decodes the nested,
//! optional-key reply into a validated `PredictionResponse`.
//!
//! Every failure mode (transport, non-success status, undecodable body, an
//! `"Error"` payload, missing or out-of-range probability) is a recoverable
//! `PredictionError`. Nothing here panics or aborts a batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::PredictionResponse;
use crate::error::PipelineError;

/// Default endpoint of a locally served model.
pub const DEFAULT_PREDICT_URL: &str = "http://127.0.0.1:5000/predict";

/// Default direction-classifier decision threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Errors from a single prediction request.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("service reported error: {0}")]
    Remote(String),

    #[error("response has no direction probability")]
    MissingProbability,

    #[error("direction probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<PredictionError> for PipelineError {
    fn from(err: PredictionError) -> Self {
        PipelineError::service(err.to_string())
    }
}

/// Anything that can answer a prediction request for one asset.
pub trait PredictionService: Send + Sync {
    /// Human-readable name of this service.
    fn name(&self) -> &str;

    /// Issue exactly one logical request for `asset_id`.
    fn fetch(&self, asset_id: &str, threshold: f64)
        -> Result<PredictionResponse, PredictionError>;
}

// ── Wire format ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    ticker: &'a str,
    threshold: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    #[serde(rename = "Last Date", default)]
    last_date: Option<String>,
    #[serde(rename = "Direction Prediction", default)]
    direction: Option<WireDirection>,
    #[serde(rename = "Volatility Prediction", default)]
    volatility: Option<WireVolatility>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDirection {
    #[serde(rename = "Probability", default)]
    probability: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct WireVolatility {
    #[serde(rename = "Prediction", default)]
    prediction: Option<WireForecast>,
    #[serde(rename = "Model Description", default)]
    model: Option<WireModel>,
}

#[derive(Debug, Default, Deserialize)]
struct WireForecast {
    #[serde(rename = "Predicted Change/Volume", default)]
    predicted_change: Option<f64>,
    #[serde(rename = "Predicted Variance", default)]
    predicted_variance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct WireModel {
    #[serde(rename = "Model AIC", default)]
    aic: Option<f64>,
    #[serde(rename = "QLIKE Score", default)]
    qlike: Option<f64>,
}

/// Decode and validate a raw response body.
pub fn decode_response(asset_id: &str, body: &str) -> Result<PredictionResponse, PredictionError> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|e| PredictionError::Malformed(e.to_string()))?;

    if let Some(message) = wire.error {
        return Err(PredictionError::Remote(message));
    }

    let probability = wire
        .direction
        .and_then(|d| d.probability)
        .ok_or(PredictionError::MissingProbability)?;
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(PredictionError::InvalidProbability(probability));
    }

    let volatility = wire.volatility.unwrap_or_default();
    let forecast = volatility.prediction.unwrap_or_default();
    let model = volatility.model.unwrap_or_default();

    Ok(PredictionResponse {
        asset_id: asset_id.to_string(),
        direction_probability: probability,
        predicted_change_pct: forecast.predicted_change,
        predicted_variance: forecast.predicted_variance,
        model_aic: model.aic,
        qlike_score: model.qlike,
        last_observed_date: wire.last_date,
    })
}

// ── HTTP client ──────────────────────────────────────────────────────

/// Blocking HTTP client for the prediction endpoint.
pub struct HttpPredictionClient {
    client: reqwest::blocking::Client,
    url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpPredictionClient {
    /// `timeout` bounds each request, so one slow asset cannot stall a batch.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, PredictionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    fn send_once(
        &self,
        asset_id: &str,
        threshold: f64,
    ) -> Result<PredictionResponse, PredictionError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&PredictRequest {
                ticker: asset_id,
                threshold,
            })
            .send()
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        let status = resp.status();
        debug!(asset = asset_id, status = status.as_u16(), "prediction response");

        let body = resp
            .text()
            .map_err(|e| PredictionError::Malformed(format!("unreadable body: {e}")))?;

        if !status.is_success() {
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        decode_response(asset_id, &body)
    }
}

/// Transport failures and server-side statuses are worth another attempt.
fn is_retryable(err: &PredictionError) -> bool {
    match err {
        PredictionError::Network(_) => true,
        PredictionError::Status { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

impl PredictionService for HttpPredictionClient {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(
        &self,
        asset_id: &str,
        threshold: f64,
    ) -> Result<PredictionResponse, PredictionError> {
        let mut attempt = 0;
        loop {
            match self.send_once(asset_id, threshold) {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!(asset = asset_id, attempt, error = %e, "retrying prediction request");
                    std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::CannedServer;

    const FULL_BODY: &str = r#"{
        "Last Date": "2024-03-28 00:00:00+05:30",
        "Direction Prediction": {"Direction": "Up", "Probability": 0.63},
        "Volatility Prediction": {
            "Prediction": {"Predicted Change/Volume": 2.4, "Predicted Variance": 5.76},
            "Model Description": {"Model AIC": 4211.7, "QLIKE Score": 1.21, "p": 1, "q": 1}
        }
    }"#;

    #[test]
    fn decodes_full_response() {
        let resp = decode_response("INFY.NS", FULL_BODY).unwrap();
        assert_eq!(resp.asset_id, "INFY.NS");
        assert_eq!(resp.direction_probability, 0.63);
        assert_eq!(resp.predicted_change_pct, Some(2.4));
        assert_eq!(resp.predicted_variance, Some(5.76));
        assert_eq!(resp.model_aic, Some(4211.7));
        assert_eq!(resp.qlike_score, Some(1.21));
        assert_eq!(
            resp.last_observed_date.as_deref(),
            Some("2024-03-28 00:00:00+05:30")
        );
    }

    #[test]
    fn absent_volatility_block_is_none_not_zero() {
        let body = r#"{"Direction Prediction": {"Probability": 0.41}}"#;
        let resp = decode_response("TCS.NS", body).unwrap();
        assert_eq!(resp.predicted_change_pct, None);
        assert_eq!(resp.predicted_variance, None);
        assert_eq!(resp.qlike_score, None);
    }

    #[test]
    fn null_fields_decode_as_absent() {
        let body = r#"{
            "Direction Prediction": {"Probability": 0.7},
            "Volatility Prediction": {"Prediction": {"Predicted Change/Volume": null}}
        }"#;
        let resp = decode_response("X", body).unwrap();
        assert_eq!(resp.predicted_change_pct, None);
    }

    #[test]
    fn missing_probability_is_an_error() {
        let body = r#"{"Direction Prediction": {"Direction": "Up"}}"#;
        assert!(matches!(
            decode_response("X", body),
            Err(PredictionError::MissingProbability)
        ));
    }

    #[test]
    fn error_payload_is_an_error() {
        let body = r#"{"Error": "No data for ticker"}"#;
        let err = decode_response("X", body).unwrap_err();
        assert!(matches!(err, PredictionError::Remote(ref m) if m == "No data for ticker"));
    }

    #[test]
    fn out_of_range_probability_rejected() {
        let body = r#"{"Direction Prediction": {"Probability": 1.3}}"#;
        assert!(matches!(
            decode_response("X", body),
            Err(PredictionError::InvalidProbability(_))
        ));
    }

    #[test]
    fn malformed_body_rejected() {
        assert!(matches!(
            decode_response("X", "<html>"),
            Err(PredictionError::Malformed(_))
        ));
    }

    #[test]
    fn converts_to_service_error() {
        let err: PipelineError = PredictionError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert_eq!(err.kind(), "service_error");
    }

    #[test]
    fn retry_policy() {
        assert!(is_retryable(&PredictionError::Network("reset".into())));
        assert!(is_retryable(&PredictionError::Status {
            status: 503,
            body: String::new()
        }));
        assert!(!is_retryable(&PredictionError::Status {
            status: 404,
            body: String::new()
        }));
        assert!(!is_retryable(&PredictionError::MissingProbability));
    }

    fn client_for(server: &CannedServer, max_retries: u32) -> HttpPredictionClient {
        let mut client = HttpPredictionClient::new(
            format!("{}/predict", server.url),
            Duration::from_secs(5),
            max_retries,
        )
        .unwrap();
        client.base_delay = Duration::from_millis(1);
        client
    }

    #[test]
    fn server_error_status_is_reported_with_body() {
        let server =
            CannedServer::start("500 Internal Server Error", r#"{"detail":"model crashed"}"#);
        let err = client_for(&server, 0).fetch("INFY.NS", 0.5).unwrap_err();

        match err {
            PredictionError::Status { status, ref body } => {
                assert_eq!(status, 500);
                assert!(body.contains("model crashed"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn error_payload_with_success_status_is_remote() {
        let server = CannedServer::start("200 OK", r#"{"Error":"unknown ticker"}"#);
        let err = client_for(&server, 2).fetch("NOPE.NS", 0.5).unwrap_err();

        assert!(matches!(err, PredictionError::Remote(ref m) if m == "unknown ticker"));
        // Remote errors are final, so no retry happens.
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn success_status_decodes_the_body() {
        let server = CannedServer::start("200 OK", FULL_BODY);
        let resp = client_for(&server, 0).fetch("INFY.NS", 0.5).unwrap();
        assert_eq!(resp.asset_id, "INFY.NS");
        assert_eq!(resp.direction_probability, 0.63);
    }

    #[test]
    fn server_errors_retry_up_to_the_limit() {
        let server = CannedServer::start("503 Service Unavailable", "{}");
        let err = client_for(&server, 2).fetch("INFY.NS", 0.5).unwrap_err();
        assert!(matches!(err, PredictionError::Status { status: 503, .. }));
        assert_eq!(server.hits(), 3);
    }
}
