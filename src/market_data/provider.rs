// =============================================================================
// Market-data provider seam
// =============================================================================
//
// The scanner only needs two capabilities from an exchange: the tradable
// symbol universe and a page of recent candles for one symbol.  Retry, auth
// and rate-limit handling live behind this trait.
// =============================================================================

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use super::Candle;

/// Failures reported by a [`MarketDataProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Source of symbols and candles.
///
/// Symbols use the `BASE/QUOTE` form (e.g. `BTC/USDT`).  `timeframe` is an
/// opaque token such as `"1h"`; its legality is the provider's concern.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// All symbols the provider can serve candles for.
    async fn list_symbols(&self) -> Result<BTreeSet<String>, ProviderError>;

    /// Up to `limit` most recent candles, oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ProviderError>;
}
