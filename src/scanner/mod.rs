// =============================================================================
// Scan Orchestrator — concurrent per-symbol divergence scan
// =============================================================================
//
// For one timeframe the scanner:
//   1. loads the symbol universe and keeps symbols with the quote suffix,
//   2. spawns one task per symbol on a JoinSet; a semaphore caps how many
//      candle fetches are in flight at once,
//   3. runs the indicator pipeline and divergence check on each symbol's
//      closes,
//   4. collects matches as tasks finish.
//
// A failing symbol (provider error, timeout, malformed candles, too little
// history) is logged and skipped; only a failed universe lookup fails the
// scan.  Dropping the scan future drops the JoinSet, which aborts every
// in-flight symbol task.
// =============================================================================

pub mod events;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::divergence_detector::DivergenceDetector;
use crate::indicators::IndicatorError;
use crate::market_data::{closing_prices, CandleError, MarketDataProvider, ProviderError};
use crate::runtime_config::ScannerConfig;

pub use events::{emit, EventSender, ScanEvent, ScanRequest, ScanResult, SkippedSymbol};

// =============================================================================
// Errors
// =============================================================================

/// Why a single symbol was dropped from a scan.
#[derive(Debug, Error)]
pub enum SymbolError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("malformed candle data: {0}")]
    Candles(#[from] CandleError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("candle fetch timed out after {0:?}")]
    TimedOut(Duration),
}

/// Scan-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("symbol universe unavailable: {0}")]
    UniverseUnavailable(ProviderError),

    #[error("scan superseded by a newer request")]
    Cancelled,

    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

// =============================================================================
// Scanner
// =============================================================================

/// Knobs that shape a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// Candles requested per symbol.
    pub candle_limit: u32,
    /// Maximum candle fetches in flight at once.
    pub max_concurrent_fetches: usize,
    /// Deadline for one symbol's candle fetch.
    pub symbol_timeout: Duration,
}

impl From<&ScannerConfig> for ScanSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            candle_limit: config.candle_limit,
            max_concurrent_fetches: config.max_concurrent_fetches,
            symbol_timeout: Duration::from_secs(config.symbol_timeout_secs),
        }
    }
}

pub struct Scanner {
    provider: Arc<dyn MarketDataProvider>,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(provider: Arc<dyn MarketDataProvider>, settings: ScanSettings) -> Self {
        Self { provider, settings }
    }

    /// Run one scan and return the matching symbols.
    ///
    /// Emits `ScanStarted`, then `SymbolMatched` / `SymbolSkipped` as symbol
    /// evaluations finish.  Completion, failure and cancellation events are
    /// left to the caller, which knows whether this scan is still current.
    #[instrument(skip(self, request, events), fields(timeframe = %request.timeframe))]
    pub async fn scan(
        &self,
        scan_id: Uuid,
        request: &ScanRequest,
        events: &EventSender,
    ) -> Result<ScanResult, ScanError> {
        let started_at = Utc::now();
        emit(
            events,
            ScanEvent::ScanStarted {
                scan_id,
                timeframe: request.timeframe.clone(),
                quote_suffix: request.quote_suffix.clone(),
            },
        );

        let universe = self.provider.list_symbols().await.map_err(|e| {
            error!(error = %e, "failed to load symbol universe");
            ScanError::UniverseUnavailable(e)
        })?;
        let universe_size = universe.len();

        let symbols: Vec<String> = universe
            .into_iter()
            .filter(|s| s.ends_with(&request.quote_suffix))
            .collect();

        info!(
            universe = universe_size,
            selected = symbols.len(),
            quote_suffix = %request.quote_suffix,
            "symbol universe loaded"
        );

        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.max(1)));
        let mut tasks = JoinSet::new();
        for symbol in &symbols {
            let provider = Arc::clone(&self.provider);
            let permits = Arc::clone(&permits);
            let symbol = symbol.clone();
            let timeframe = request.timeframe.clone();
            let settings = self.settings.clone();
            tasks.spawn(async move {
                let outcome =
                    evaluate_symbol(provider.as_ref(), &permits, &symbol, &timeframe, &settings).await;
                (symbol, outcome)
            });
        }

        let mut pending: BTreeSet<String> = symbols.iter().cloned().collect();
        let mut matches = Vec::new();
        let mut skipped = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (symbol, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "symbol evaluation task failed");
                    continue;
                }
            };
            pending.remove(&symbol);

            match outcome {
                Ok(true) => {
                    info!(symbol = %symbol, "bullish divergence detected");
                    emit(
                        events,
                        ScanEvent::SymbolMatched {
                            scan_id,
                            symbol: symbol.clone(),
                        },
                    );
                    matches.push(symbol);
                }
                Ok(false) => {
                    debug!(symbol = %symbol, "no divergence");
                }
                Err(e) => {
                    warn!(symbol = %symbol, reason = %e, "symbol skipped");
                    skip(events, scan_id, &mut skipped, symbol, e.to_string());
                }
            }
        }

        // Whatever is still pending belongs to a task that panicked.
        for symbol in pending {
            skip(
                events,
                scan_id,
                &mut skipped,
                symbol,
                "evaluation task failed".to_string(),
            );
        }

        let result = ScanResult {
            scan_id,
            timeframe: request.timeframe.clone(),
            quote_suffix: request.quote_suffix.clone(),
            started_at,
            completed_at: Utc::now(),
            symbols_scanned: symbols.len(),
            matches,
            skipped,
        };

        info!(
            scanned = result.symbols_scanned,
            matched = result.matches.len(),
            skipped = result.skipped.len(),
            "scan finished"
        );
        Ok(result)
    }
}

fn skip(
    events: &EventSender,
    scan_id: Uuid,
    skipped: &mut Vec<SkippedSymbol>,
    symbol: String,
    reason: String,
) {
    emit(
        events,
        ScanEvent::SymbolSkipped {
            scan_id,
            symbol: symbol.clone(),
            reason: reason.clone(),
        },
    );
    skipped.push(SkippedSymbol { symbol, reason });
}

/// Fetch one symbol's candles (holding a concurrency permit only for the
/// fetch) and check them for bullish divergence.
async fn evaluate_symbol(
    provider: &dyn MarketDataProvider,
    permits: &Semaphore,
    symbol: &str,
    timeframe: &str,
    settings: &ScanSettings,
) -> Result<bool, SymbolError> {
    let candles = {
        let _permit = permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Unavailable("scan concurrency gate closed".into()))?;
        tokio::time::timeout(
            settings.symbol_timeout,
            provider.fetch_candles(symbol, timeframe, settings.candle_limit),
        )
        .await
        .map_err(|_| SymbolError::TimedOut(settings.symbol_timeout))??
    };

    let closes = closing_prices(&candles)?;
    let check = DivergenceDetector::evaluate(&closes)?;
    Ok(check.is_bullish())
}
