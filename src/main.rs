// =============================================================================
// Divergence Scanner — Main Entry Point
// =============================================================================
//
// Two modes:
//   divergence-scanner                          serve the HTTP / WebSocket API
//   divergence-scanner scan [timeframe] [quote]  run one scan and print matches
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod divergence_detector;
mod indicators;
mod market_data;
mod runtime_config;
mod scanner;
mod types;

#[cfg(test)]
mod test_util;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::runtime_config::ScannerConfig;
use crate::scanner::ScanEvent;

const CONFIG_PATH: &str = "scanner_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ScannerConfig::load(CONFIG_PATH)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            ScannerConfig::default().normalised()
        })
        .apply_env_overrides()?;

    info!(
        timeframe = %config.default_timeframe,
        quote_suffix = %config.quote_suffix,
        candle_limit = config.candle_limit,
        max_concurrent = config.max_concurrent_fetches,
        "Divergence scanner starting"
    );

    // ── 2. Build provider and shared state ───────────────────────────────
    let client = BinanceClient::new(&config.binance_base_url)?;
    let state = Arc::new(AppState::new(config, Arc::new(client)));

    // ── 3. Dispatch ──────────────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("scan") => run_once(state, args.get(1).cloned(), args.get(2).cloned()).await,
        Some(other) => anyhow::bail!(
            "unknown command `{other}`; usage: divergence-scanner [scan [timeframe] [quote_suffix]]"
        ),
        None => serve(state).await,
    }
}

/// One-shot scan: log lifecycle events, print matches one per line.
async fn run_once(
    state: Arc<AppState>,
    timeframe: Option<String>,
    quote_suffix: Option<String>,
) -> anyhow::Result<()> {
    let request = state.resolve_request(timeframe, quote_suffix)?;

    let mut events = state.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ScanEvent::SymbolSkipped { symbol, reason, .. }) => {
                    info!(symbol = %symbol, reason = %reason, "skipped");
                }
                Ok(ScanEvent::SymbolMatched { symbol, .. }) => {
                    info!(symbol = %symbol, "matched");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "event log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = state.run_scan(request).await;
    logger.abort();

    let result = outcome.context("scan failed")?;
    for symbol in result.sorted_matches() {
        println!("{symbol}");
    }
    info!(
        matches = result.matches.len(),
        skipped = result.skipped.len(),
        "scan finished"
    );
    Ok(())
}

/// Serve the API until Ctrl+C.
async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr.clone();
    let app = api::rest::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("Divergence scanner shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received — stopping gracefully");
}
