// =============================================================================
// Scanner Configuration — JSON file + environment overrides
// =============================================================================
//
// All fields carry `#[serde(default)]` so that adding new fields never breaks
// loading an older config file.  Environment variables (optionally from a
// `.env` file) take precedence over the file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Fewest candles that can produce a MACD value.
pub const MIN_CANDLE_LIMIT: u32 = 27;
/// Largest kline page the exchange serves in one request.
pub const MAX_CANDLE_LIMIT: u32 = 1000;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_timeframe() -> String {
    "1h".to_string()
}

fn default_quote_suffix() -> String {
    "/USDT".to_string()
}

fn default_candle_limit() -> u32 {
    500
}

fn default_max_concurrent_fetches() -> usize {
    10
}

fn default_symbol_timeout_secs() -> u64 {
    20
}

fn default_binance_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// ScannerConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Timeframe used when a scan request does not name one.
    #[serde(default = "default_timeframe")]
    pub default_timeframe: String,

    /// Symbols must end with this suffix to be scanned.
    #[serde(default = "default_quote_suffix")]
    pub quote_suffix: String,

    /// Candles fetched per symbol.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,

    /// Upper bound on concurrent candle fetches.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-symbol candle fetch deadline, in seconds.
    #[serde(default = "default_symbol_timeout_secs")]
    pub symbol_timeout_secs: u64,

    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,

    /// Address the HTTP API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_timeframe: default_timeframe(),
            quote_suffix: default_quote_suffix(),
            candle_limit: default_candle_limit(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            symbol_timeout_secs: default_symbol_timeout_secs(),
            binance_base_url: default_binance_base_url(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(path = %path.display(), "scanner config loaded");
        Ok(config.normalised())
    }

    /// Apply `DIVSCAN_*` overrides from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (keyed by environment variable name).
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("DIVSCAN_TIMEFRAME") {
            self.default_timeframe = v.trim().to_string();
        }
        if let Some(v) = lookup("DIVSCAN_QUOTE_SUFFIX") {
            self.quote_suffix = v.trim().to_string();
        }
        if let Some(v) = lookup("DIVSCAN_CANDLE_LIMIT") {
            self.candle_limit = v
                .trim()
                .parse()
                .with_context(|| format!("DIVSCAN_CANDLE_LIMIT is not a number: {v}"))?;
        }
        if let Some(v) = lookup("DIVSCAN_MAX_CONCURRENT") {
            self.max_concurrent_fetches = v
                .trim()
                .parse()
                .with_context(|| format!("DIVSCAN_MAX_CONCURRENT is not a number: {v}"))?;
        }
        if let Some(v) = lookup("DIVSCAN_SYMBOL_TIMEOUT_SECS") {
            self.symbol_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("DIVSCAN_SYMBOL_TIMEOUT_SECS is not a number: {v}"))?;
        }
        if let Some(v) = lookup("DIVSCAN_BINANCE_URL") {
            self.binance_base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("DIVSCAN_BIND_ADDR") {
            self.bind_addr = v.trim().to_string();
        }
        Ok(self.normalised())
    }

    /// Clamp values into their usable ranges.
    pub fn normalised(mut self) -> Self {
        let limit = self.candle_limit.clamp(MIN_CANDLE_LIMIT, MAX_CANDLE_LIMIT);
        if limit != self.candle_limit {
            warn!(requested = self.candle_limit, used = limit, "candle_limit clamped");
            self.candle_limit = limit;
        }
        if self.max_concurrent_fetches == 0 {
            warn!("max_concurrent_fetches of 0 raised to 1");
            self.max_concurrent_fetches = 1;
        }
        if self.symbol_timeout_secs == 0 {
            warn!("symbol_timeout_secs of 0 raised to 1");
            self.symbol_timeout_secs = 1;
        }
        if self.quote_suffix.is_empty() {
            warn!("empty quote_suffix replaced with default");
            self.quote_suffix = default_quote_suffix();
        }
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = ScannerConfig::default();
        assert_eq!(cfg.default_timeframe, "1h");
        assert_eq!(cfg.quote_suffix, "/USDT");
        assert_eq!(cfg.candle_limit, 500);
        assert_eq!(cfg.max_concurrent_fetches, 10);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: ScannerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ScannerConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "default_timeframe": "4h", "max_concurrent_fetches": 3 }"#;
        let cfg: ScannerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.default_timeframe, "4h");
        assert_eq!(cfg.max_concurrent_fetches, 3);
        assert_eq!(cfg.quote_suffix, "/USDT");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let cfg = ScannerConfig::default()
            .apply_overrides(lookup(&[
                ("DIVSCAN_TIMEFRAME", "15m"),
                ("DIVSCAN_QUOTE_SUFFIX", "/BTC"),
                ("DIVSCAN_MAX_CONCURRENT", " 4 "),
                ("DIVSCAN_BINANCE_URL", "http://localhost:9000/"),
            ]))
            .unwrap();
        assert_eq!(cfg.default_timeframe, "15m");
        assert_eq!(cfg.quote_suffix, "/BTC");
        assert_eq!(cfg.max_concurrent_fetches, 4);
        assert_eq!(cfg.binance_base_url, "http://localhost:9000");
    }

    #[test]
    fn bad_numeric_override_is_an_error() {
        let err = ScannerConfig::default()
            .apply_overrides(lookup(&[("DIVSCAN_CANDLE_LIMIT", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("DIVSCAN_CANDLE_LIMIT"));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = ScannerConfig {
            candle_limit: 10,
            max_concurrent_fetches: 0,
            symbol_timeout_secs: 0,
            quote_suffix: String::new(),
            ..ScannerConfig::default()
        }
        .normalised();
        assert_eq!(cfg.candle_limit, MIN_CANDLE_LIMIT);
        assert_eq!(cfg.max_concurrent_fetches, 1);
        assert_eq!(cfg.symbol_timeout_secs, 1);
        assert_eq!(cfg.quote_suffix, "/USDT");

        let big = ScannerConfig {
            candle_limit: 5000,
            ..ScannerConfig::default()
        }
        .normalised();
        assert_eq!(big.candle_limit, MAX_CANDLE_LIMIT);
    }

    #[test]
    fn load_missing_file_errors() {
        assert!(ScannerConfig::load("/nonexistent/scanner_config.json").is_err());
    }
}
