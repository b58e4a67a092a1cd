pub mod candle;
pub mod provider;

// Re-export for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{closing_prices, Candle, CandleError};
pub use provider::{MarketDataProvider, ProviderError};
