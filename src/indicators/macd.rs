// =============================================================================
// Moving Average Convergence / Divergence (MACD)
// =============================================================================
//
//   raw MACD  = EMA12(close) - EMA26(close)        (one value per bar)
//   MACD line = raw MACD from bar 26 onwards       (EMA26 warm-up discarded)
//   signal    = EMA9(MACD line)
//   histogram = MACD line - signal
//
// All three output series start at bar 26 and cover the same bars.
// =============================================================================

use serde::Serialize;

use super::ema::calculate_ema;
use super::error::IndicatorError;
use super::series::{AlignedSeries, PriceSeries};

pub const FAST_WINDOW: usize = 12;
pub const SLOW_WINDOW: usize = 26;
pub const SIGNAL_WINDOW: usize = 9;

/// Number of leading bars dropped from the raw MACD line.
pub const WARM_UP_BARS: usize = SLOW_WINDOW;

/// MACD line, signal line and histogram, aligned bar-for-bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdResult {
    pub macd: AlignedSeries,
    pub signal: AlignedSeries,
    pub histogram: AlignedSeries,
}

/// Compute MACD(12, 26, 9) over `closes`.
///
/// # Errors
/// `InsufficientData` unless `closes` has more than 26 values.
pub fn calculate_macd(closes: &PriceSeries) -> Result<MacdResult, IndicatorError> {
    if closes.len() <= WARM_UP_BARS {
        return Err(IndicatorError::insufficient(
            "MACD",
            WARM_UP_BARS + 1,
            closes.len(),
        ));
    }

    let prices = closes.to_aligned();
    let fast = calculate_ema(&prices, FAST_WINDOW)?;
    let slow = calculate_ema(&prices, SLOW_WINDOW)?;

    let macd = fast.minus(&slow).from_bar(WARM_UP_BARS);
    let signal = calculate_ema(&macd, SIGNAL_WINDOW)?;
    let histogram = macd.minus(&signal);

    Ok(MacdResult {
        macd,
        signal,
        histogram,
    })
}
