//! CSV file data adapter.
//!
//! Expects a header row followed by `timestamp,open,high,low,close,volume`
//! records. Timestamps may be RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
//! (both read as UTC), or integer epoch seconds or milliseconds.

use crate::domain::candle::{Candle, first_unordered};
use crate::domain::error::BandtraderError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;

/// Integer timestamps above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn data_error(&self, line: u64, reason: impl std::fmt::Display) -> BandtraderError {
        BandtraderError::Data {
            reason: format!("{}:{}: {}", self.path.display(), line, reason),
        }
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    let epoch: i64 = raw.parse().ok()?;
    if epoch.abs() > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(index)
        .ok_or_else(|| format!("missing {} column", name))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid {} value '{}': {}", name, raw, e))
}

impl DataPort for CsvAdapter {
    fn fetch_candles(&self) -> Result<Vec<Candle>, BandtraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| BandtraderError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| BandtraderError::Data {
                reason: format!("CSV parse error in {}: {}", self.path.display(), e),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let ts_raw = record
                .get(0)
                .ok_or_else(|| self.data_error(line, "missing timestamp column"))?;
            let timestamp = parse_timestamp(ts_raw)
                .ok_or_else(|| self.data_error(line, format!("invalid timestamp '{}'", ts_raw)))?;

            let open = parse_field(&record, 1, "open").map_err(|r| self.data_error(line, r))?;
            let high = parse_field(&record, 2, "high").map_err(|r| self.data_error(line, r))?;
            let low = parse_field(&record, 3, "low").map_err(|r| self.data_error(line, r))?;
            let close = parse_field(&record, 4, "close").map_err(|r| self.data_error(line, r))?;
            let volume = parse_field(&record, 5, "volume").map_err(|r| self.data_error(line, r))?;

            for (name, price) in [("open", open), ("high", high), ("low", low), ("close", close)] {
                if !price.is_finite() || price <= 0.0 {
                    return Err(self.data_error(
                        line,
                        format!("{} must be a positive number, got {}", name, price),
                    ));
                }
            }
            if !volume.is_finite() || volume < 0.0 {
                return Err(self.data_error(line, format!("invalid volume {}", volume)));
            }

            candles.push(Candle {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        if candles.is_empty() {
            return Err(BandtraderError::NoData {
                path: self.path.display().to_string(),
            });
        }
        if let Some(i) = first_unordered(&candles) {
            return Err(BandtraderError::Data {
                reason: format!(
                    "{}: timestamps must strictly increase, record {} ({}) follows {}",
                    self.path.display(),
                    i + 1,
                    candles[i].timestamp,
                    candles[i - 1].timestamp
                ),
            });
        }

        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("timestamp,open,high,low,close,volume\n{}", body)).unwrap();
        path
    }

    #[test]
    fn fetch_candles_reads_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "prices.csv",
            "2024-01-15,100.0,110.0,90.0,105.0,50000\n\
             2024-01-16,105.0,115.0,100.0,110.0,60000\n\
             2024-01-17,110.0,120.0,105.0,115.0,55000\n",
        );
        let candles = CsvAdapter::new(path).fetch_candles().unwrap();

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].timestamp, parse_timestamp("2024-01-15T00:00:00Z").unwrap());
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].high, 110.0);
        assert_eq!(candles[0].low, 90.0);
        assert_eq!(candles[0].close, 105.0);
        assert_eq!(candles[0].volume, 50000.0);
    }

    #[test]
    fn parse_timestamp_formats() {
        let expected = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(parse_timestamp("1700000000"), Some(expected));
        assert_eq!(parse_timestamp("1700000000000"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14T22:13:20Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14T23:13:20+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14 22:13:20"), Some(expected));
        assert_eq!(
            parse_timestamp("2023-11-14"),
            DateTime::from_timestamp(1_699_920_000, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn missing_file_is_data_error() {
        let result = CsvAdapter::new("/nonexistent/prices.csv").fetch_candles();
        assert!(matches!(result, Err(BandtraderError::Data { .. })));
    }

    #[test]
    fn header_only_is_no_data() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "empty.csv", "");
        let result = CsvAdapter::new(path).fetch_candles();
        assert!(matches!(result, Err(BandtraderError::NoData { .. })));
    }

    #[test]
    fn non_positive_price_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "bad.csv", "2024-01-15,100,110,0,105,10\n");
        let err = CsvAdapter::new(path).fetch_candles().unwrap_err();
        assert!(err.to_string().contains("low must be a positive number"));
    }

    #[test]
    fn non_numeric_price_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "bad.csv", "2024-01-15,100,110,90,abc,10\n");
        let err = CsvAdapter::new(path).fetch_candles().unwrap_err();
        assert!(err.to_string().contains("invalid close value"));
    }

    #[test]
    fn nan_price_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "bad.csv", "2024-01-15,100,110,90,NaN,10\n");
        assert!(CsvAdapter::new(path).fetch_candles().is_err());
    }

    #[test]
    fn out_of_order_timestamps_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "unordered.csv",
            "2024-01-16,100,110,90,105,10\n2024-01-15,100,110,90,105,10\n",
        );
        let err = CsvAdapter::new(path).fetch_candles().unwrap_err();
        assert!(err.to_string().contains("strictly increase"));
    }

    #[test]
    fn duplicate_timestamps_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "dupes.csv",
            "1700000000,100,110,90,105,10\n1700000000,100,110,90,105,10\n",
        );
        assert!(CsvAdapter::new(path).fetch_candles().is_err());
    }

    #[test]
    fn short_row_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "short.csv", "2024-01-15,100,110,90\n");
        assert!(CsvAdapter::new(path).fetch_candles().is_err());
    }
}
