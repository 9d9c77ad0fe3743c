//! TOML configuration for signal batches and replays.
//!
//! Every section and field has a default, so an empty file (or no file) is a
//! valid configuration. CLI flags are applied on top with the `with_*`
//! helpers and the result re-validated.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradecast_core::market::BarQuery;
use tradecast_core::prediction::{DEFAULT_PREDICT_URL, DEFAULT_THRESHOLD};
use tradecast_core::simulator::ReplayParams;

use crate::orchestrator::DEFAULT_MAX_CONCURRENCY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradecastConfig {
    pub signals: SignalsConfig,
    pub backtest: BacktestConfig,
    pub service: ServiceConfig,
    pub output: OutputConfig,
}

/// Signal batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    /// Number of assets drawn from the universe; `None` takes all of them.
    pub sample_size: Option<usize>,
    /// Seed for a reproducible draw.
    pub seed: Option<u64>,
    /// Stop distance as a multiple of the target distance.
    pub risk_ratio: f64,
    /// Decision threshold forwarded to the direction model.
    pub threshold: f64,
    /// Worker count, shared by signal batches and replay batches.
    pub max_concurrency: usize,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            sample_size: None,
            seed: None,
            risk_ratio: 0.5,
            threshold: DEFAULT_THRESHOLD,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Replay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub entry_window_bars: usize,
    pub entry_tolerance_pct: f64,
    pub interval: String,
    pub range: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        let params = ReplayParams::default();
        let query = BarQuery::intraday();
        Self {
            entry_window_bars: params.entry_window_bars,
            entry_tolerance_pct: params.entry_tolerance_pct,
            interval: query.interval,
            range: query.range,
        }
    }
}

impl BacktestConfig {
    pub fn replay_params(&self) -> ReplayParams {
        ReplayParams {
            entry_window_bars: self.entry_window_bars,
            entry_tolerance_pct: self.entry_tolerance_pct,
        }
    }

    pub fn bar_query(&self) -> BarQuery {
        BarQuery::new(&self.interval, &self.range)
    }
}

/// External service endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub url: String,
    /// Per-request deadline for the prediction and market data calls.
    pub timeout_secs: u64,
    /// Extra attempts on transport errors, 429 and 5xx for both the
    /// prediction and market data calls. Zero disables retries.
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PREDICT_URL.to_string(),
            timeout_secs: 30,
            max_retries: 0,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("trade_data"),
        }
    }
}

impl TradecastConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.signals;
        if s.max_concurrency == 0 {
            return Err(invalid("signals.max_concurrency must be at least 1"));
        }
        if !s.risk_ratio.is_finite() || s.risk_ratio <= 0.0 {
            return Err(invalid(format!(
                "signals.risk_ratio must be positive, got {}",
                s.risk_ratio
            )));
        }
        if !(0.0..=1.0).contains(&s.threshold) {
            return Err(invalid(format!(
                "signals.threshold must lie in [0, 1], got {}",
                s.threshold
            )));
        }
        if s.sample_size == Some(0) {
            return Err(invalid("signals.sample_size must be at least 1"));
        }

        let b = &self.backtest;
        if b.entry_window_bars == 0 {
            return Err(invalid("backtest.entry_window_bars must be at least 1"));
        }
        if !b.entry_tolerance_pct.is_finite() || b.entry_tolerance_pct < 0.0 {
            return Err(invalid(format!(
                "backtest.entry_tolerance_pct must be non-negative, got {}",
                b.entry_tolerance_pct
            )));
        }
        if b.interval.trim().is_empty() || b.range.trim().is_empty() {
            return Err(invalid("backtest.interval and backtest.range must be set"));
        }

        if self.service.url.trim().is_empty() {
            return Err(invalid("service.url must be set"));
        }
        if self.service.timeout_secs == 0 {
            return Err(invalid("service.timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn with_risk_ratio(mut self, risk_ratio: Option<f64>) -> Self {
        if let Some(r) = risk_ratio {
            self.signals.risk_ratio = r;
        }
        self
    }

    pub fn with_sample_size(mut self, sample_size: Option<usize>) -> Self {
        if sample_size.is_some() {
            self.signals.sample_size = sample_size;
        }
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.signals.seed = seed;
        }
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        if let Some(n) = max_concurrency {
            self.signals.max_concurrency = n;
        }
        self
    }

    pub fn with_entry_window(mut self, bars: Option<usize>) -> Self {
        if let Some(n) = bars {
            self.backtest.entry_window_bars = n;
        }
        self
    }

    pub fn with_entry_tolerance(mut self, pct: Option<f64>) -> Self {
        if let Some(p) = pct {
            self.backtest.entry_tolerance_pct = p;
        }
        self
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(d) = dir {
            self.output.dir = d;
        }
        self
    }

    pub fn with_service_url(mut self, url: Option<String>) -> Self {
        if let Some(u) = url {
            self.service.url = u;
        }
        self
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
