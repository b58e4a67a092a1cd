use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::PriceSeries;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle as returned by the market-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time, milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Candle data that cannot be turned into a price series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("candle {index} has a non-finite close")]
    NonFiniteClose { index: usize },

    #[error("candle {index} is not after its predecessor")]
    OutOfOrder { index: usize },
}

// ---------------------------------------------------------------------------
// Price extraction
// ---------------------------------------------------------------------------

/// Derive the closing-price series from `candles`.
///
/// Candles must be strictly ascending by timestamp and every close must be
/// finite; the series keeps the candles' order one-to-one.
pub fn closing_prices(candles: &[Candle]) -> Result<PriceSeries, CandleError> {
    let mut closes = Vec::with_capacity(candles.len());
    let mut prev_ts: Option<i64> = None;

    for (index, candle) in candles.iter().enumerate() {
        if prev_ts.is_some_and(|prev| candle.timestamp <= prev) {
            return Err(CandleError::OutOfOrder { index });
        }
        if !candle.close.is_finite() {
            return Err(CandleError::NonFiniteClose { index });
        }
        prev_ts = Some(candle.timestamp);
        closes.push(candle.close);
    }

    Ok(PriceSeries::new(closes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle(timestamp: i64, close: f64) -> Candle {
        Candle::new(timestamp, close, close + 1.0, close - 1.0, close, 100.0)
    }

    #[test]
    fn closes_follow_candle_order() {
        let candles: Vec<Candle> = (0..5)
            .map(|i| sample_candle(i * 60_000, 100.0 + i as f64))
            .collect();
        let series = closing_prices(&candles).unwrap();
        assert_eq!(series.closes(), &[100.0, 101.0, 102.0, 103.0, 104.0]);
    }

    #[test]
    fn empty_candles_give_empty_series() {
        assert!(closing_prices(&[]).unwrap().is_empty());
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let candles = vec![
            sample_candle(0, 1.0),
            sample_candle(60_000, 2.0),
            sample_candle(60_000, 3.0),
        ];
        assert_eq!(
            closing_prices(&candles),
            Err(CandleError::OutOfOrder { index: 2 })
        );
    }

    #[test]
    fn descending_timestamp_rejected() {
        let candles = vec![sample_candle(120_000, 1.0), sample_candle(60_000, 2.0)];
        assert_eq!(
            closing_prices(&candles),
            Err(CandleError::OutOfOrder { index: 1 })
        );
    }

    #[test]
    fn nan_close_rejected() {
        let candles = vec![sample_candle(0, 1.0), sample_candle(60_000, f64::NAN)];
        assert_eq!(
            closing_prices(&candles),
            Err(CandleError::NonFiniteClose { index: 1 })
        );
    }
}
