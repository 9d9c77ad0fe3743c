//! Asset universe — the candidate list a signal batch samples from.
//!
//! Two on-disk shapes are accepted:
//! - plain text, one asset per line, `#` starts a comment;
//! - an exchange equity-list CSV with a `SYMBOL` column, where each symbol
//!   gets an exchange suffix (e.g. `.NS`) appended.
//!
//! Sampling is without replacement. A seed makes the draw reproducible.

use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

/// NSE's published list of all listed equities.
pub const NSE_EQUITY_LIST_URL: &str = "https://nsearchives.nseindia.com/content/equities/EQUITY_L.csv";

/// Yahoo suffix for NSE listings.
pub const NSE_SUFFIX: &str = ".NS";

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse equity list: {0}")]
    Csv(#[from] csv::Error),

    #[error("equity list has no SYMBOL column")]
    NoSymbolColumn,

    #[error("download equity list: {0}")]
    Download(String),

    #[error("universe is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    assets: Vec<String>,
}

impl Universe {
    /// Build from a list, dropping blanks and duplicates (first occurrence wins).
    pub fn new<I, S>(assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = std::collections::HashSet::new();
        let assets = assets
            .into_iter()
            .map(Into::into)
            .map(|a: String| a.trim().to_string())
            .filter(|a| !a.is_empty() && seen.insert(a.clone()))
            .collect();
        Self { assets }
    }

    /// Parse plain text, one asset per line.
    pub fn from_lines(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(|line| line.split('#').next().unwrap_or_default()),
        )
    }

    /// Parse an equity-list CSV, appending `suffix` to every `SYMBOL`.
    pub fn from_equity_list(content: &str, suffix: &str) -> Result<Self, UniverseError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let column = rdr
            .headers()?
            .iter()
            .position(|h| h == "SYMBOL")
            .ok_or(UniverseError::NoSymbolColumn)?;

        let mut symbols = Vec::new();
        for record in rdr.records() {
            if let Some(symbol) = record?.get(column) {
                symbols.push(format!("{symbol}{suffix}"));
            }
        }
        Ok(Self::new(symbols))
    }

    /// Load from a file; a `.csv` file is read as an equity list.
    pub fn from_file(path: &Path, suffix: &str) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path)?;
        let universe = if path.extension().is_some_and(|ext| ext == "csv") {
            Self::from_equity_list(&content, suffix)?
        } else {
            Self::from_lines(&content)
        };
        if universe.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok(universe)
    }

    /// Download the NSE equity list.
    pub fn fetch_nse(timeout: Duration) -> Result<Self, UniverseError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| UniverseError::Download(e.to_string()))?;
        let body = client
            .get(NSE_EQUITY_LIST_URL)
            .header("Accept", "text/csv")
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| UniverseError::Download(e.to_string()))?;
        Self::from_equity_list(&body, NSE_SUFFIX)
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Draw `n` distinct assets. `n >= len()` returns the whole universe in
    /// file order.
    pub fn sample(&self, n: usize, seed: Option<u64>) -> Vec<String> {
        if n >= self.assets.len() {
            return self.assets.clone();
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.assets.choose_multiple(&mut rng, n).cloned().collect()
    }

    /// Plain-text form readable by `from_lines`.
    pub fn to_lines(&self) -> String {
        let mut out = self.assets.join("\n");
        out.push('\n');
        out
    }
}
