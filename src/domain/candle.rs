//! Price bar representation.

use chrono::{DateTime, Utc};

/// One OHLCV bar. Series of candles are ordered by strictly increasing
/// `timestamp`; the ingestion boundary enforces that before the engine sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Check that timestamps strictly increase. Returns the index of the first
/// offending candle.
pub fn first_unordered(candles: &[Candle]) -> Option<usize> {
    candles
        .windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
        .map(|i| i + 1)
}
