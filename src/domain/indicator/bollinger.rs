//! Bollinger Bands.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) of close over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Warmup: first (period-1) bars are invalid. A non-zero `offset` shifts the
//! computed values `offset` bars later (positive) or earlier (negative)
//! relative to the candle they annotate; entries shifted in from outside the
//! series are invalid.

use crate::domain::candle::Candle;
use crate::domain::error::BandtraderError;
use crate::domain::indicator::{BandPoint, BandSeries};

/// Relative threshold under which a window's σ is treated as exactly zero.
const ZERO_WIDTH_EPSILON: f64 = 1e-12;

pub fn compute_bands(
    candles: &[Candle],
    period: usize,
    std_dev: f64,
    offset: i64,
) -> Result<BandSeries, BandtraderError> {
    if period == 0 {
        return Err(BandtraderError::invalid("period", "period must be positive"));
    }
    if !std_dev.is_finite() || std_dev < 0.0 {
        return Err(BandtraderError::invalid(
            "std_dev",
            format!("multiplier must be finite and non-negative, got {std_dev}"),
        ));
    }

    let warmup = period - 1;
    let raw: Vec<Option<(f64, f64, f64)>> = (0..candles.len())
        .map(|i| {
            if i < warmup {
                return None;
            }
            let (middle, sigma) = window_stats(&candles[i + 1 - period..=i]);
            Some((middle + std_dev * sigma, middle, middle - std_dev * sigma))
        })
        .collect();

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let source = (i as i64)
                .checked_sub(offset)
                .filter(|s| *s >= 0)
                .and_then(|s| raw.get(s as usize).copied().flatten());

            match source {
                Some((upper, middle, lower)) => BandPoint {
                    timestamp: candle.timestamp,
                    valid: true,
                    upper,
                    middle,
                    lower,
                },
                None => BandPoint {
                    timestamp: candle.timestamp,
                    valid: false,
                    upper: 0.0,
                    middle: 0.0,
                    lower: 0.0,
                },
            }
        })
        .collect();

    Ok(BandSeries {
        period,
        std_dev,
        offset,
        values,
    })
}

/// Mean and population σ of the closes in `window`.
fn window_stats(window: &[Candle]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean: f64 = window.iter().map(|c| c.close).sum::<f64>() / n;

    let variance: f64 = window
        .iter()
        .map(|c| {
            let diff = c.close - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;

    let sigma = variance.sqrt();
    if sigma <= mean.abs() * ZERO_WIDTH_EPSILON {
        (mean, 0.0)
    } else {
        (mean, sigma)
    }
}
