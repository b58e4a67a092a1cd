// =============================================================================
// Divergence Detector — Bullish MACD + RSI divergence
// =============================================================================
//
// A bullish divergence is flagged only when two independent legs agree:
//
//   1. MACD leg — among bars with a negative histogram, the two most recent
//      ones show price making a higher low while the histogram makes a lower
//      low.  Only negative bars inside the trailing window (as many bars as
//      there are negative readings) are considered.
//   2. RSI leg — among oversold readings (RSI < 30) the latest is lower than
//      the previous one, while the last close is above the close taken as
//      many bars back from the end as there are oversold readings.
//
// Closes are always looked up through the histogram's bar alignment.
// =============================================================================

use serde::Serialize;
use tracing::debug;

use crate::indicators::rsi::{DEFAULT_PERIOD, OVERSOLD};
use crate::indicators::{calculate_macd, calculate_rsi, AlignedSeries, IndicatorError, MacdResult, PriceSeries};

/// Outcome of both divergence legs for one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DivergenceCheck {
    pub macd_leg: bool,
    pub rsi_leg: bool,
}

impl DivergenceCheck {
    pub fn is_bullish(&self) -> bool {
        self.macd_leg && self.rsi_leg
    }
}

/// Stateless bullish-divergence detector.
pub struct DivergenceDetector;

impl DivergenceDetector {
    /// Evaluate both legs.  Degenerate inputs (fewer than two lows in a leg)
    /// make that leg false; this never fails.
    pub fn check(macd: &MacdResult, rsi: &AlignedSeries, closes: &PriceSeries) -> DivergenceCheck {
        DivergenceCheck {
            macd_leg: macd_leg(&macd.histogram, closes),
            rsi_leg: rsi_leg(rsi, closes),
        }
    }

    /// `true` only when both the MACD and the RSI leg hold.
    pub fn detect_bullish_divergence(
        macd: &MacdResult,
        rsi: &AlignedSeries,
        closes: &PriceSeries,
    ) -> bool {
        Self::check(macd, rsi, closes).is_bullish()
    }

    /// Run the full indicator pipeline (MACD 12/26/9, RSI 14) over `closes`
    /// and check for divergence.
    pub fn evaluate(closes: &PriceSeries) -> Result<DivergenceCheck, IndicatorError> {
        let macd = calculate_macd(closes)?;
        let rsi = calculate_rsi(closes, DEFAULT_PERIOD)?;
        let check = Self::check(&macd, &rsi, closes);
        debug!(
            bars = closes.len(),
            macd_leg = check.macd_leg,
            rsi_leg = check.rsi_leg,
            "divergence evaluated"
        );
        Ok(check)
    }
}

fn macd_leg(histogram: &AlignedSeries, closes: &PriceSeries) -> bool {
    let lows: Vec<usize> = histogram
        .bars()
        .filter(|&(_, value)| value < 0.0)
        .map(|(bar, _)| bar)
        .collect();
    if lows.len() < 2 {
        return false;
    }

    let window_start = closes.len().saturating_sub(lows.len());
    let paired: Vec<(f64, f64)> = lows
        .iter()
        .filter(|&&bar| bar >= window_start)
        .filter_map(|&bar| Some((closes.close_at(bar)?, histogram.at_bar(bar)?)))
        .collect();

    match paired.as_slice() {
        [.., (prev_close, prev_hist), (last_close, last_hist)] => {
            last_close > prev_close && last_hist < prev_hist
        }
        _ => false,
    }
}

fn rsi_leg(rsi: &AlignedSeries, closes: &PriceSeries) -> bool {
    let lows: Vec<f64> = rsi
        .values()
        .iter()
        .copied()
        .filter(|&value| value < OVERSOLD)
        .collect();

    let [.., prev_low, last_low] = lows.as_slice() else {
        return false;
    };

    let anchor = closes
        .len()
        .checked_sub(lows.len())
        .and_then(|bar| closes.close_at(bar));

    match (closes.last(), anchor) {
        (Some(last_close), Some(anchor_close)) => last_close > anchor_close && last_low < prev_low,
        _ => false,
    }
}
