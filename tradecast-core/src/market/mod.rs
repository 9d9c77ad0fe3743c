//! Market data collaborator.
//!
//! The `MarketData` trait abstracts over price sources (Yahoo chart API, CSV
//! files on disk) so the aggregator and the replay runner can be exercised
//! against fakes. Providers return ordered `PriceBar` sequences, possibly
//! empty; an empty series is not an error at this layer.

pub mod csv_provider;
pub mod yahoo;

pub use csv_provider::CsvBarProvider;
pub use yahoo::YahooProvider;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PriceBar;

/// Structured error types for market data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("asset not found: {asset}")]
    AssetNotFound { asset: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// Bar granularity and lookback span, in the provider's vocabulary
/// (`1m`, `5m`, `1d` / `1d`, `5d`, `1mo`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarQuery {
    pub interval: String,
    pub range: String,
}

impl BarQuery {
    pub fn new(interval: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            range: range.into(),
        }
    }

    /// One day of daily bars; its last close is the current price.
    pub fn latest_daily() -> Self {
        Self::new("1d", "1d")
    }

    /// One session of one-minute bars, the default replay series.
    pub fn intraday() -> Self {
        Self::new("1m", "1d")
    }
}

/// Source of price history for an asset.
pub trait MarketData: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Ordered close series for `asset_id`.
    fn bars(&self, asset_id: &str, query: &BarQuery) -> Result<Vec<PriceBar>, DataError>;

    /// Latest available close, or `None` when the daily series is empty.
    fn latest_close(&self, asset_id: &str) -> Result<Option<f64>, DataError> {
        let bars = self.bars(asset_id, &BarQuery::latest_daily())?;
        Ok(bars.last().map(|b| b.close))
    }
}

/// Drop unusable closes and any bar that does not advance the clock.
pub fn normalize_bars(bars: Vec<PriceBar>) -> Vec<PriceBar> {
    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars.into_iter().filter(PriceBar::is_valid) {
        match out.last() {
            Some(prev) if prev.timestamp >= bar.timestamp => continue,
            _ => out.push(bar),
        }
    }
    out
}
