// =============================================================================
// Scan lifecycle events and results
// =============================================================================
//
// Events are published on a tokio broadcast channel and consumed by whatever
// presents them (WebSocket clients, the CLI logger).  Every event carries the
// scan id so consumers can drop events of a superseded scan.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the lifecycle event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub type EventSender = broadcast::Sender<ScanEvent>;

/// What to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub timeframe: String,
    /// Only symbols ending in this suffix are evaluated (e.g. `/USDT`).
    pub quote_suffix: String,
}

/// A symbol that was dropped from the scan and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Symbols showing bullish divergence in one completed scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: Uuid,
    pub timeframe: String,
    pub quote_suffix: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Number of symbols that passed the suffix filter.
    pub symbols_scanned: usize,
    /// Matching symbols in the order their evaluations finished.
    pub matches: Vec<String>,
    pub skipped: Vec<SkippedSymbol>,
}

impl ScanResult {
    /// Matches in lexical order.
    pub fn sorted_matches(&self) -> Vec<String> {
        let mut m = self.matches.clone();
        m.sort();
        m
    }
}

/// Lifecycle notifications emitted while a scan runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    ScanStarted {
        scan_id: Uuid,
        timeframe: String,
        quote_suffix: String,
    },
    SymbolMatched {
        scan_id: Uuid,
        symbol: String,
    },
    SymbolSkipped {
        scan_id: Uuid,
        symbol: String,
        reason: String,
    },
    ScanFailed {
        scan_id: Uuid,
        reason: String,
    },
    ScanCancelled {
        scan_id: Uuid,
    },
    ScanCompleted {
        result: ScanResult,
    },
}

impl ScanEvent {
    pub fn scan_id(&self) -> Uuid {
        match self {
            Self::ScanStarted { scan_id, .. }
            | Self::SymbolMatched { scan_id, .. }
            | Self::SymbolSkipped { scan_id, .. }
            | Self::ScanFailed { scan_id, .. }
            | Self::ScanCancelled { scan_id } => *scan_id,
            Self::ScanCompleted { result } => result.scan_id,
        }
    }
}

/// Publish `event`; having no subscribers is not an error.
pub fn emit(events: &EventSender, event: ScanEvent) {
    let _ = events.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialise_with_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ScanEvent::SymbolMatched {
            scan_id: id,
            symbol: "BTC/USDT".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "symbol_matched");
        assert_eq!(json["symbol"], "BTC/USDT");
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let (tx, _) = broadcast::channel(4);
        emit(&tx, ScanEvent::ScanCancelled { scan_id: Uuid::nil() });
    }

    #[test]
    fn scan_id_accessor_covers_completed() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let event = ScanEvent::ScanCompleted {
            result: ScanResult {
                scan_id: id,
                timeframe: "1h".into(),
                quote_suffix: "/USDT".into(),
                started_at: now,
                completed_at: now,
                symbols_scanned: 0,
                matches: vec![],
                skipped: vec![],
            },
        };
        assert_eq!(event.scan_id(), id);
    }
}
