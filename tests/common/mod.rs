#![allow(dead_code)]

use bandtrader::domain::error::BandtraderError;
use bandtrader::domain::trading_config::TradingConfig;
use bandtrader::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use std::io::Write;

pub use bandtrader::domain::candle::Candle;

/// 2024-01-01T00:00:00Z
const START_EPOCH: i64 = 1_704_067_200;

pub struct MockDataPort {
    pub candles: Vec<Candle>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            candles: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(&self) -> Result<Vec<Candle>, BandtraderError> {
        if let Some(reason) = &self.error {
            return Err(BandtraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.candles.clone())
    }
}

pub fn ts(i: usize) -> DateTime<Utc> {
    DateTime::from_timestamp(START_EPOCH + i as i64 * 86_400, 0).unwrap()
}

pub fn make_candle(i: usize, close: f64) -> Candle {
    Candle {
        timestamp: ts(i),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000.0,
    }
}

pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(i, c))
        .collect()
}

pub fn flat_series(n: usize, price: f64) -> Vec<Candle> {
    candles_from_closes(&vec![price; n])
}

/// Two overlaid sine waves on a slow drift: plenty of band crossings both ways.
pub fn wave_series(n: usize) -> Vec<Candle> {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 8.0 * (x / 3.0).sin() + 5.0 * (x / 11.0).sin() + 0.05 * x
        })
        .collect();
    candles_from_closes(&closes)
}

pub const BREAKOUT_PERIOD: usize = 10;
pub const BREAKOUT_STD_DEV: f64 = 2.0;
pub const BREAKOUT_ENTRY_INDEX: usize = 20;
pub const BREAKOUT_EXIT_INDEX: usize = 22;

/// Twenty bars alternating 100/101, a spike to 120 (breaks the period-10,
/// 2-sigma upper band), one more bar at 121, then 103 (below the middle band).
pub fn breakout_series() -> Vec<Candle> {
    let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 2) as f64).collect();
    closes.extend([120.0, 121.0, 103.0]);
    candles_from_closes(&closes)
}

pub fn sample_config() -> TradingConfig {
    TradingConfig {
        period: BREAKOUT_PERIOD,
        std_dev: BREAKOUT_STD_DEV,
        initial_capital: 10_000.0,
        ..Default::default()
    }
}

pub fn candles_to_csv(candles: &[Candle]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp.timestamp(),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    out
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
