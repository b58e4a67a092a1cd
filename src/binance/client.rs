// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only unsigned endpoints are used: `exchangeInfo` for the symbol universe and
// `klines` for candles.  Every request first reserves its weight with the
// rate-limit tracker and feeds the response headers back into it.
//
// Symbols are exposed as `BASE/QUOTE` and converted to Binance's
// concatenated form (`BASEQUOTE`) on the way out.
// =============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::market_data::{Candle, MarketDataProvider, ProviderError};

/// Request weight of `GET /api/v3/exchangeInfo` (all symbols).
const EXCHANGE_INFO_WEIGHT: u32 = 20;
/// Request weight of `GET /api/v3/klines`.
const KLINES_WEIGHT: u32 = 2;
/// Binance error code for an unknown symbol.
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Binance REST API client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client against `base_url` (e.g. `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/exchangeInfo — every symbol currently trading, as
    /// `BASE/QUOTE`.
    #[instrument(skip(self), name = "binance::get_trading_symbols")]
    pub async fn get_trading_symbols(&self) -> Result<BTreeSet<String>, ProviderError> {
        let body = self
            .get_json("/api/v3/exchangeInfo", &[], EXCHANGE_INFO_WEIGHT, None)
            .await?;
        let symbols = parse_trading_symbols(&body)?;
        debug!(count = symbols.len(), "trading symbols retrieved");
        Ok(symbols)
    }

    /// GET /api/v3/klines — up to `limit` most recent candles, oldest first.
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume, ...
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ProviderError> {
        let exchange_symbol = to_exchange_symbol(symbol);
        let limit = limit.to_string();
        let body = self
            .get_json(
                "/api/v3/klines",
                &[
                    ("symbol", exchange_symbol.as_str()),
                    ("interval", interval),
                    ("limit", limit.as_str()),
                ],
                KLINES_WEIGHT,
                Some(symbol),
            )
            .await?;

        let candles = parse_klines(&body)?;
        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Issue a weighted GET and return the JSON body of a successful response.
    ///
    /// `symbol` is used to report an invalid-symbol rejection as
    /// `SymbolNotFound`.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        weight: u32,
        symbol: Option<&str>,
    ) -> Result<Value, ProviderError> {
        if !self.rate_limit.try_acquire(weight) {
            return Err(ProviderError::Unavailable(
                "request weight budget exhausted for this minute".into(),
            ));
        }

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("GET {path} failed: {e}")))?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            // Error bodies are usually `{code, msg}` but gateways may send HTML.
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let err = classify_failure(status.as_u16(), &body, symbol);
            warn!(path, status = status.as_u16(), error = %err, "Binance request failed");
            return Err(err);
        }

        resp.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("GET {path} returned non-JSON body: {e}"))
        })
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn list_symbols(&self) -> Result<BTreeSet<String>, ProviderError> {
        self.get_trading_symbols().await
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ProviderError> {
        self.get_klines(symbol, timeframe, limit).await
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

/// `BTC/USDT` -> `BTCUSDT`.
pub fn to_exchange_symbol(symbol: &str) -> String {
    symbol.replace('/', "").to_uppercase()
}

/// Map a non-success response to a provider error.
fn classify_failure(status: u16, body: &Value, symbol: Option<&str>) -> ProviderError {
    let code = body["code"].as_i64();
    let msg = body["msg"].as_str().unwrap_or("no message");

    match (code, symbol) {
        (Some(INVALID_SYMBOL_CODE), Some(sym)) => ProviderError::SymbolNotFound(sym.to_string()),
        _ => ProviderError::Unavailable(format!("HTTP {status}: {msg}")),
    }
}

/// Extract `BASE/QUOTE` for every symbol with status `TRADING`.
fn parse_trading_symbols(body: &Value) -> Result<BTreeSet<String>, ProviderError> {
    let entries = body["symbols"].as_array().ok_or_else(|| {
        ProviderError::MalformedResponse("exchangeInfo response missing 'symbols' array".into())
    })?;

    let symbols = entries
        .iter()
        .filter(|s| s["status"].as_str() == Some("TRADING"))
        .filter_map(|s| {
            let base = s["baseAsset"].as_str()?;
            let quote = s["quoteAsset"].as_str()?;
            Some(format!("{base}/{quote}"))
        })
        .collect();

    Ok(symbols)
}

/// Parse Binance's array-of-arrays kline payload.
fn parse_klines(body: &Value) -> Result<Vec<Candle>, ProviderError> {
    let raw = body
        .as_array()
        .ok_or_else(|| ProviderError::MalformedResponse("klines response is not an array".into()))?;

    raw.iter()
        .enumerate()
        .map(|(i, entry)| {
            let arr = entry
                .as_array()
                .filter(|a| a.len() >= 6)
                .ok_or_else(|| ProviderError::MalformedResponse(format!("kline {i} is malformed")))?;

            let timestamp = arr[0].as_i64().ok_or_else(|| {
                ProviderError::MalformedResponse(format!("kline {i} has no open time"))
            })?;

            Ok(Candle::new(
                timestamp,
                parse_str_f64(&arr[1])?,
                parse_str_f64(&arr[2])?,
                parse_str_f64(&arr[3])?,
                parse_str_f64(&arr[4])?,
                parse_str_f64(&arr[5])?,
            ))
        })
        .collect()
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &Value) -> Result<f64, ProviderError> {
    match val {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| ProviderError::MalformedResponse(format!("failed to parse '{s}' as f64"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ProviderError::MalformedResponse(format!("{n} is not a valid f64"))),
        _ => Err(ProviderError::MalformedResponse(format!(
            "expected string or number, got: {val}"
        ))),
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exchange_symbol_is_concatenated() {
        assert_eq!(to_exchange_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(to_exchange_symbol("eth/btc"), "ETHBTC");
    }

    #[test]
    fn trading_symbols_only() {
        let body = json!({
            "timezone": "UTC",
            "symbols": [
                { "symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT" },
                { "symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC" },
                { "symbol": "LUNAUSDT", "status": "BREAK", "baseAsset": "LUNA", "quoteAsset": "USDT" },
                { "symbol": "ODD", "status": "TRADING" }
            ]
        });
        let symbols = parse_trading_symbols(&body).unwrap();
        let expected: BTreeSet<String> = ["BTC/USDT", "ETH/BTC"].iter().map(|s| s.to_string()).collect();
        assert_eq!(symbols, expected);
    }

    #[test]
    fn exchange_info_without_symbols_is_malformed() {
        assert!(matches!(
            parse_trading_symbols(&json!({ "timezone": "UTC" })),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn klines_parse() {
        let body = json!([
            [1700000000000i64, "37000.00", "37050.00", "36990.00", "37020.00", "123.456",
             1700000059999i64, "4567890.12", 1500, "60.123", "2224455.66", "0"],
            [1700000060000i64, "37020.00", "37100.00", "37010.00", "37090.50", "99.0",
             1700000119999i64, "1.0", 10, "1.0", "1.0", "0"]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_000_000);
        assert!((candles[1].close - 37090.5).abs() < f64::EPSILON);
        assert!((candles[0].volume - 123.456).abs() < 1e-9);
    }

    #[test]
    fn short_kline_row_is_malformed() {
        let body = json!([[1700000000000i64, "1", "2"]]);
        assert!(matches!(
            parse_klines(&body),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn non_numeric_price_is_malformed() {
        let body = json!([[1700000000000i64, "1", "2", "0.5", "abc", "10"]]);
        assert!(matches!(
            parse_klines(&body),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn invalid_symbol_maps_to_not_found() {
        let body = json!({ "code": -1121, "msg": "Invalid symbol." });
        assert_eq!(
            classify_failure(400, &body, Some("FOO/USDT")),
            ProviderError::SymbolNotFound("FOO/USDT".into())
        );
    }

    #[test]
    fn other_failures_are_unavailable() {
        let body = json!({ "code": -1003, "msg": "Too many requests." });
        match classify_failure(429, &body, Some("BTC/USDT")) {
            ProviderError::Unavailable(reason) => {
                assert!(reason.contains("429"));
                assert!(reason.contains("Too many requests"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = BinanceClient::new("http://localhost:1/").unwrap();
        assert!(format!("{client:?}").contains("http://localhost:1\""));
    }
}
