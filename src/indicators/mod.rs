// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators behind the
// divergence scan.  Every series carries the bar index of its first value so
// series of different lengths can be compared without positional guesswork.

pub mod ema;
pub mod error;
pub mod macd;
pub mod rsi;
pub mod series;

pub use error::IndicatorError;
pub use macd::{calculate_macd, MacdResult};
pub use rsi::calculate_rsi;
pub use series::{AlignedSeries, PriceSeries};
