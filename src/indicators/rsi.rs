// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Compute per-bar gains / losses from consecutive closes.
// Step 2 — Seed average gain / average loss with the mean of the first
//          `period` gains / losses.
// Step 3 — Apply Wilder's smoothing for every later bar:
//            avg_gain = (prev_avg_gain * (period - 1) + gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + loss) / period
// Step 4 — RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//
// A zero average loss leaves RS undefined; RSI is pinned to 100 in that case,
// including a completely flat window.
//
// The first value belongs to bar `period`, the last to the final close.
// =============================================================================

use super::error::IndicatorError;
use super::series::{AlignedSeries, PriceSeries};

pub const DEFAULT_PERIOD: usize = 14;

/// Readings strictly below this level count as oversold.
pub const OVERSOLD: f64 = 30.0;

/// Compute the RSI series for `closes`.
///
/// The result has `closes.len() - period` values starting at bar `period`.
///
/// # Errors
/// - `InvalidPeriod` when `period == 0`
/// - `InsufficientData` unless `closes.len() > period`
pub fn calculate_rsi(closes: &PriceSeries, period: usize) -> Result<AlignedSeries, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod {
            indicator: "RSI",
            period,
        });
    }
    if closes.len() <= period {
        return Err(IndicatorError::insufficient("RSI", period + 1, closes.len()));
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .closes()
        .windows(2)
        .map(|w| {
            let diff = w[1] - w[0];
            (diff.max(0.0), (-diff).max(0.0))
        })
        .unzip();

    let period_f = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period_f;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period_f;

    let mut result = Vec::with_capacity(gains.len() - period + 1);
    result.push(rsi_from_averages(avg_gain, avg_loss));

    for (&gain, &loss) in gains[period..].iter().zip(&losses[period..]) {
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
        result.push(rsi_from_averages(avg_gain, avg_loss));
    }

    Ok(AlignedSeries::new(period, result))
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
