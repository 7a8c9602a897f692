//! Price data access port trait.

use crate::domain::candle::Candle;
use crate::domain::error::BandtraderError;

/// Source of an ordered, validated candle series.
pub trait DataPort {
    /// Candles in strictly increasing timestamp order.
    fn fetch_candles(&self) -> Result<Vec<Candle>, BandtraderError>;
}
