// =============================================================================
// Rate-Limit Tracker — keeps scan fan-out inside Binance's request weight
// =============================================================================
//
// Binance allows 6000 request weight per minute per IP; we hard-cap ourselves
// below that.  Weight is reserved locally before each request (so concurrent
// symbol fetches cannot overshoot together) and then corrected from the
// `X-MBX-USED-WEIGHT-1M` response header.  The counter resets whenever the
// wall-clock minute changes.
// =============================================================================

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 5000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 4000;

const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

/// Thread-safe request-weight tracker backed by atomic counters.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    window_minute: AtomicU64,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            window_minute: AtomicU64::new(current_minute()),
        }
    }

    /// Reserve `weight` for a request about to be sent.  Returns `false`
    /// (and reserves nothing) if that would cross the hard limit.
    pub fn try_acquire(&self, weight: u32) -> bool {
        self.try_acquire_at(weight, current_minute())
    }

    fn try_acquire_at(&self, weight: u32, minute: u64) -> bool {
        self.roll_window(minute);

        let reserved = self
            .used_weight_1m
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = current.saturating_add(weight);
                (next <= WEIGHT_HARD_LIMIT).then_some(next)
            });

        match reserved {
            Ok(_) => true,
            Err(current) => {
                warn!(
                    current_weight = current,
                    requested_weight = weight,
                    hard_limit = WEIGHT_HARD_LIMIT,
                    "request blocked — would exceed rate-limit"
                );
                false
            }
        }
    }

    /// Update the counter from the HTTP response headers returned by Binance.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(w) = headers
            .get(USED_WEIGHT_HEADER)
            .and_then(|val| val.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };

        let prev = self.used_weight_1m.swap(w, Ordering::AcqRel);
        if w >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = w,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = w, "rate-limit weight updated from header");
    }

    fn roll_window(&self, minute: u64) {
        let prev = self.window_minute.swap(minute, Ordering::AcqRel);
        if prev != minute {
            self.used_weight_1m.store(0, Ordering::Release);
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .finish()
    }
}

fn current_minute() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 60)
        .unwrap_or_default()
}
