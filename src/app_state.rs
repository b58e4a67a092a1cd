// =============================================================================
// Central Application State — scan ownership and latest result
// =============================================================================
//
// AppState owns the one scan that is allowed to be current.  Starting a new
// scan aborts the in-flight one (dropping its JoinSet aborts the per-symbol
// tasks), announces `ScanCancelled` for it and hands its caller
// `ScanError::Cancelled`.  Only the current scan may publish `ScanCompleted`
// and replace the latest result, which lives in memory only.
//
// Thread safety:
//   - parking_lot::Mutex guards the in-flight slot; it is never held across
//     an await.
//   - parking_lot::RwLock for the latest result.
//   - Atomic counter for the number of scans started.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::market_data::MarketDataProvider;
use crate::runtime_config::ScannerConfig;
use crate::scanner::events::EVENT_CHANNEL_CAPACITY;
use crate::scanner::{
    emit, EventSender, ScanError, ScanEvent, ScanRequest, ScanResult, ScanSettings, Scanner,
};
use crate::types::ScanPhase;

// =============================================================================
// Request validation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("timeframe must not be blank")]
    BlankTimeframe,

    #[error("quote suffix must not be blank")]
    BlankQuoteSuffix,
}

// =============================================================================
// In-flight bookkeeping
// =============================================================================

/// The scan currently allowed to publish results.
struct InFlightScan {
    scan_id: Uuid,
    request: ScanRequest,
    started_at: DateTime<Utc>,
    abort: AbortHandle,
}

/// Public view of the in-flight scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunningScan {
    pub scan_id: Uuid,
    pub timeframe: String,
    pub quote_suffix: String,
    pub started_at: DateTime<Utc>,
}

/// Payload of `GET /api/v1/scan/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: ScanPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<RunningScan>,
    pub scans_started: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    pub config: ScannerConfig,
    scanner: Scanner,
    events: EventSender,
    current: Mutex<Option<InFlightScan>>,
    latest: RwLock<Option<ScanResult>>,
    scans_started: AtomicU64,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: ScannerConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let scanner = Scanner::new(provider, ScanSettings::from(&config));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            scanner,
            events,
            current: Mutex::new(None),
            latest: RwLock::new(None),
            scans_started: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    /// New receiver for scan lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Fill unset request fields from the configuration.
    pub fn resolve_request(
        &self,
        timeframe: Option<String>,
        quote_suffix: Option<String>,
    ) -> Result<ScanRequest, RequestError> {
        let timeframe = timeframe.unwrap_or_else(|| self.config.default_timeframe.clone());
        let quote_suffix = quote_suffix.unwrap_or_else(|| self.config.quote_suffix.clone());

        let timeframe = timeframe.trim();
        let quote_suffix = quote_suffix.trim();
        if timeframe.is_empty() {
            return Err(RequestError::BlankTimeframe);
        }
        if quote_suffix.is_empty() {
            return Err(RequestError::BlankQuoteSuffix);
        }

        Ok(ScanRequest {
            timeframe: timeframe.to_string(),
            quote_suffix: quote_suffix.to_string(),
        })
    }

    /// Most recent result of a scan that completed while current.
    pub fn latest_result(&self) -> Option<ScanResult> {
        self.latest.read().clone()
    }

    pub fn status(&self) -> StatusSnapshot {
        let current = self.current.lock().as_ref().map(|scan| RunningScan {
            scan_id: scan.scan_id,
            timeframe: scan.request.timeframe.clone(),
            quote_suffix: scan.request.quote_suffix.clone(),
            started_at: scan.started_at,
        });

        StatusSnapshot {
            phase: if current.is_some() {
                ScanPhase::Running
            } else {
                ScanPhase::Idle
            },
            current,
            scans_started: self.scans_started.load(Ordering::SeqCst),
            last_completed_at: self.latest.read().as_ref().map(|r| r.completed_at),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    // ── Scan execution ──────────────────────────────────────────────────

    /// Run a scan, superseding any scan still in flight.
    ///
    /// Returns `ScanError::Cancelled` if a newer scan supersedes this one
    /// before it completes.
    pub async fn run_scan(self: &Arc<Self>, request: ScanRequest) -> Result<ScanResult, ScanError> {
        let scan_id = Uuid::new_v4();

        let handle = {
            let mut current = self.current.lock();
            if let Some(previous) = current.take() {
                previous.abort.abort();
                warn!(
                    superseded = %previous.scan_id,
                    by = %scan_id,
                    "in-flight scan superseded"
                );
                emit(
                    &self.events,
                    ScanEvent::ScanCancelled {
                        scan_id: previous.scan_id,
                    },
                );
            }

            let state = Arc::clone(self);
            let task_request = request.clone();
            let handle = tokio::spawn(async move {
                let outcome = state
                    .scanner
                    .scan(scan_id, &task_request, &state.events)
                    .await;
                state.settle(scan_id, outcome)
            });

            *current = Some(InFlightScan {
                scan_id,
                request,
                started_at: Utc::now(),
                abort: handle.abort_handle(),
            });
            handle
        };
        self.scans_started.fetch_add(1, Ordering::SeqCst);

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(ScanError::Cancelled),
            Err(e) => {
                error!(scan_id = %scan_id, error = %e, "scan task failed");
                let failure = ScanError::TaskFailed(e.to_string());
                self.settle(scan_id, Err(failure))
            }
        }
    }

    /// Publish the outcome of `scan_id` if it is still the current scan.
    fn settle(
        &self,
        scan_id: Uuid,
        outcome: Result<ScanResult, ScanError>,
    ) -> Result<ScanResult, ScanError> {
        let mut current = self.current.lock();
        if current.as_ref().map(|scan| scan.scan_id) != Some(scan_id) {
            return Err(ScanError::Cancelled);
        }
        *current = None;

        match outcome {
            Ok(result) => {
                *self.latest.write() = Some(result.clone());
                info!(
                    scan_id = %scan_id,
                    matches = result.matches.len(),
                    "scan completed"
                );
                emit(
                    &self.events,
                    ScanEvent::ScanCompleted {
                        result: result.clone(),
                    },
                );
                Ok(result)
            }
            Err(e) => {
                emit(
                    &self.events,
                    ScanEvent::ScanFailed {
                        scan_id,
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }
}
