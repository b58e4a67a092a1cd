// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (window + 1)
//   EMA_0      = value_0
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The series is seeded with the raw first value rather than an SMA, so the
// output has exactly one value per input value and keeps the input's bar
// alignment.
// =============================================================================

use super::error::IndicatorError;
use super::series::AlignedSeries;

/// Compute the EMA of `series` with the given `window`.
///
/// The result covers the same bars as the input.
///
/// # Errors
/// - `InvalidPeriod` when `window == 0`
/// - `InsufficientData` when `series` is empty
pub fn calculate_ema(series: &AlignedSeries, window: usize) -> Result<AlignedSeries, IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::InvalidPeriod {
            indicator: "EMA",
            period: window,
        });
    }

    let values = series.values();
    let Some(&seed) = values.first() else {
        return Err(IndicatorError::insufficient("EMA", 1, 0));
    };

    let multiplier = 2.0 / (window as f64 + 1.0);

    let mut result = Vec::with_capacity(values.len());
    result.push(seed);

    let mut prev_ema = seed;
    for &value in &values[1..] {
        let ema = value * multiplier + prev_ema * (1.0 - multiplier);
        result.push(ema);
        prev_ema = ema;
    }

    Ok(AlignedSeries::new(series.start(), result))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn ascending(n: usize) -> AlignedSeries {
        AlignedSeries::new(0, (1..=n).map(|i| i as f64).collect())
    }

    #[test]
    fn ema_empty_input() {
        let err = calculate_ema(&AlignedSeries::new(0, vec![]), 5).unwrap_err();
        assert_eq!(err, IndicatorError::insufficient("EMA", 1, 0));
    }

    #[test]
    fn ema_window_zero() {
        assert!(matches!(
            calculate_ema(&ascending(3), 0),
            Err(IndicatorError::InvalidPeriod { period: 0, .. })
        ));
    }

    #[test]
    fn ema_seeded_with_first_value() {
        let input = AlignedSeries::new(0, vec![42.0, 10.0, 11.0]);
        let ema = calculate_ema(&input, 12).unwrap();
        assert_eq!(ema.values()[0], 42.0);
        assert_eq!(ema.len(), input.len());
    }

    #[test]
    fn ema_single_value() {
        let ema = calculate_ema(&AlignedSeries::new(0, vec![7.5]), 26).unwrap();
        assert_eq!(ema.values(), &[7.5]);
    }

    #[test]
    fn ema_known_values() {
        // multiplier = 2/6 = 1/3
        let input = ascending(10);
        let ema = calculate_ema(&input, 5).unwrap();
        assert_eq!(ema.len(), 10);

        let mult = 2.0 / 6.0;
        let mut expected = 1.0;
        assert!((ema.values()[0] - expected).abs() < 1e-12);
        for (i, &v) in input.values().iter().enumerate().skip(1) {
            expected = v * mult + expected * (1.0 - mult);
            assert!((ema.values()[i] - expected).abs() < 1e-12, "bar {i}: got {}, expected {expected}", ema.values()[i]);
        }
        // 2nd value by hand: 2/3 + 1*2/3 = 1.333..
        assert!((ema.values()[1] - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ema_keeps_bar_alignment() {
        let input = AlignedSeries::new(26, vec![1.0, -2.0, 3.0]);
        let ema = calculate_ema(&input, 9).unwrap();
        assert_eq!(ema.start(), 26);
        assert_eq!(ema.end(), input.end());
    }

    #[test]
    fn ema_flat_series_stays_flat() {
        let input = AlignedSeries::new(0, vec![100.0; 50]);
        let ema = calculate_ema(&input, 26).unwrap();
        assert!(ema.values().iter().all(|&v| (v - 100.0).abs() < 1e-12));
    }

    #[test]
    fn ema_seed_and_length_hold_for_many_windows() {
        let input = AlignedSeries::new(0, vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);
        for window in 1..30 {
            let ema = calculate_ema(&input, window).unwrap();
            assert_eq!(ema.values()[0], 3.0);
            assert_eq!(ema.len(), input.len());
        }
    }
}
