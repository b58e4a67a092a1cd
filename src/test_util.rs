// Shared fixtures for unit tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::market_data::{Candle, MarketDataProvider, ProviderError};

/// 60 closes whose last two negative-histogram bars (58, 59) show a higher
/// price low with a deeper histogram, and whose last two oversold RSI
/// readings are falling while the last close sits above the close two bars
/// back.
pub const BULLISH_DIVERGENCE_CLOSES: [f64; 60] = [
    100.0, 97.0, 99.0, 98.0, 95.0, 94.0, 97.0, 97.0, 97.0, 98.0, 101.0, 102.0, 105.0, 107.0,
    110.0, 111.0, 110.0, 106.0, 105.0, 104.0, 107.0, 106.0, 103.0, 104.0, 106.0, 103.0, 101.0,
    99.0, 99.0, 101.0, 97.0, 97.0, 96.0, 98.0, 96.0, 94.0, 96.0, 95.0, 91.0, 91.0, 91.0, 90.0,
    92.0, 93.0, 91.0, 87.0, 89.0, 88.0, 89.0, 89.0, 89.0, 92.0, 94.0, 92.0, 89.0, 86.0, 83.0,
    80.0, 79.0, 80.0,
];

/// One-hour candles with the given closes, starting at an arbitrary epoch.
pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new(
                1_700_000_000_000 + i as i64 * 3_600_000,
                close,
                close + 0.5,
                close - 0.5,
                close,
                1_000.0,
            )
        })
        .collect()
}

pub fn diverging_candles() -> Vec<Candle> {
    candles_from_closes(&BULLISH_DIVERGENCE_CLOSES)
}

pub fn rising_candles() -> Vec<Candle> {
    let closes: Vec<f64> = (100..200).map(|x| x as f64).collect();
    candles_from_closes(&closes)
}

/// In-memory provider with scripted per-symbol responses.
#[derive(Default)]
pub struct StaticProvider {
    symbols: Option<BTreeSet<String>>,
    responses: HashMap<String, Result<Vec<Candle>, ProviderError>>,
    delay: Duration,
    slow_symbols: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self {
            symbols: Some(BTreeSet::new()),
            ..Self::default()
        }
    }

    /// A provider whose universe lookup fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.add_symbol(symbol);
        self.responses.insert(symbol.to_string(), Ok(candles));
        self
    }

    pub fn with_failure(mut self, symbol: &str, error: ProviderError) -> Self {
        self.add_symbol(symbol);
        self.responses.insert(symbol.to_string(), Err(error));
        self
    }

    /// Delay applied to every candle fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Extra delay for one symbol's candle fetch.
    pub fn with_slow_symbol(mut self, symbol: &str, delay: Duration) -> Self {
        self.slow_symbols.insert(symbol.to_string(), delay);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn add_symbol(&mut self, symbol: &str) {
        self.symbols
            .get_or_insert_with(BTreeSet::new)
            .insert(symbol.to_string());
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn list_symbols(&self) -> Result<BTreeSet<String>, ProviderError> {
        self.symbols
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("exchange offline".into()))
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay + self.slow_symbols.get(symbol).copied().unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = self
            .responses
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::SymbolNotFound(symbol.to_string())));

        response.map(|candles| {
            let skip = candles.len().saturating_sub(limit as usize);
            candles[skip..].to_vec()
        })
    }
}
