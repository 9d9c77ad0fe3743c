//! Yahoo Finance market data provider.
//!
//! Fetches close series from Yahoo's v8 chart API for any interval/range pair
//! (intraday `1m` bars for replays, `1d` for the current price). Retries
//! transport failures and rate limits with exponential backoff, up to a
//! caller-chosen retry limit.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; a format change surfaces as `DataError::ResponseFormatChanged`.

use std::time::Duration;

use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use super::{normalize_bars, BarQuery, DataError, MarketData};
use crate::domain::PriceBar;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    /// `max_retries` extra attempts follow a transport failure, 429 or 5xx.
    /// Zero means a single attempt.
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: "https://query2.finance.yahoo.com".into(),
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Point the provider at another chart host (a mirror or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn chart_url(&self, asset_id: &str, query: &BarQuery) -> String {
        format!(
            "{}/v8/finance/chart/{asset_id}?interval={}&range={}",
            self.base_url, query.interval, query.range
        )
    }

    /// Parse the chart API response into ordered bars.
    fn parse_response(asset_id: &str, resp: ChartResponse) -> Result<Vec<PriceBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::AssetNotFound {
                        asset: asset_id.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };

        // A session with no trades yet carries no timestamp array.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            if let Some(close) = quote.close.get(i).copied().flatten() {
                bars.push(PriceBar::new(timestamp, close));
            }
        }

        Ok(normalize_bars(bars))
    }

    fn fetch_with_retry(&self, asset_id: &str, query: &BarQuery) -> Result<Vec<PriceBar>, DataError> {
        let url = self.chart_url(asset_id, query);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    debug!(asset = asset_id, status = status.as_u16(), %url, "chart response");

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::AssetNotFound {
                            asset: asset_id.to_string(),
                        });
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!("HTTP {status} for {asset_id}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {asset_id}: {e}"
                        ))
                    })?;

                    return Self::parse_response(asset_id, chart);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketData for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn bars(&self, asset_id: &str, query: &BarQuery) -> Result<Vec<PriceBar>, DataError> {
        self.fetch_with_retry(asset_id, query)
    }
}
