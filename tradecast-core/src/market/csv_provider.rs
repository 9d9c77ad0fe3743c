//! Offline price source: one CSV file per asset.
//!
//! Layout: `<dir>/<ASSET>.csv` with a `timestamp,close` header, timestamps in
//! RFC 3339 (`2024-01-02T09:15:00Z`). The query's interval and range are not
//! applied; the file is taken to already hold the wanted series.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{normalize_bars, BarQuery, DataError, MarketData};
use crate::domain::PriceBar;

pub struct CsvBarProvider {
    dir: PathBuf,
}

impl CsvBarProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, asset_id: &str) -> PathBuf {
        self.dir.join(format!("{asset_id}.csv"))
    }

    /// Write a series in the layout this provider reads.
    pub fn write(&self, asset_id: &str, bars: &[PriceBar]) -> Result<(), DataError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut wtr = csv::Writer::from_path(self.path_for(asset_id))?;
        for bar in bars {
            wtr.serialize(bar)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn read(path: &Path) -> Result<Vec<PriceBar>, DataError> {
        let mut rdr = csv::Reader::from_path(path)?;
        let bars = rdr
            .deserialize::<PriceBar>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bars)
    }
}

impl MarketData for CsvBarProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn bars(&self, asset_id: &str, query: &BarQuery) -> Result<Vec<PriceBar>, DataError> {
        let path = self.path_for(asset_id);
        if !path.exists() {
            return Err(DataError::AssetNotFound {
                asset: asset_id.to_string(),
            });
        }
        debug!(asset = asset_id, interval = %query.interval, path = %path.display(), "reading bars");
        Ok(normalize_bars(Self::read(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn write_then_read_series() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvBarProvider::new(dir.path());
        let bars: Vec<PriceBar> = (0..3)
            .map(|i| {
                PriceBar::new(
                    Utc.with_ymd_and_hms(2024, 1, 2, 9, 15 + i, 0).unwrap(),
                    100.0 + i as f64,
                )
            })
            .collect();
        provider.write("HDFCBANK.NS", &bars).unwrap();

        let loaded = provider.bars("HDFCBANK.NS", &BarQuery::intraday()).unwrap();
        assert_eq!(loaded, bars);
        assert_eq!(provider.latest_close("HDFCBANK.NS").unwrap(), Some(102.0));
    }

    #[test]
    fn reads_hand_written_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ITC.NS.csv"),
            "timestamp,close\n2024-01-02T09:15:00Z,440.1\n2024-01-02T09:16:00Z,440.4\n",
        )
        .unwrap();
        let bars = CsvBarProvider::new(dir.path())
            .bars("ITC.NS", &BarQuery::intraday())
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 440.4);
    }

    #[test]
    fn missing_file_is_asset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvBarProvider::new(dir.path())
            .bars("NOPE", &BarQuery::intraday())
            .unwrap_err();
        assert!(matches!(err, DataError::AssetNotFound { .. }));
    }
}
