//! PriceBar — one close observation in an intraday or daily series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single close price at a point in time.
///
/// Sequences are ordered by `timestamp` (strictly increasing) and are never
/// mutated once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PriceBar {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }

    /// A bar is usable when its close is a finite, positive price.
    pub fn is_valid(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// True if timestamps are strictly increasing across the slice.
pub fn is_chronological(bars: &[PriceBar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(minute: u32, close: f64) -> PriceBar {
        PriceBar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 9, minute, 0).unwrap(),
            close,
        )
    }

    #[test]
    fn detects_invalid_close() {
        assert!(bar(15, 100.0).is_valid());
        assert!(!bar(15, f64::NAN).is_valid());
        assert!(!bar(15, 0.0).is_valid());
    }

    #[test]
    fn chronological_check() {
        assert!(is_chronological(&[bar(15, 1.0), bar(16, 1.0), bar(17, 1.0)]));
        assert!(!is_chronological(&[bar(16, 1.0), bar(15, 1.0)]));
        assert!(!is_chronological(&[bar(15, 1.0), bar(15, 1.0)]));
        assert!(is_chronological(&[]));
    }
}
