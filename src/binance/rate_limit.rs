// =============================================================================
// Request-Weight Tracker — keeps the refresh cycles clear of Binance 429s
// =============================================================================
//
// Binance charges every REST call a request weight against a 1200-per-minute
// budget per IP (we hard-cap ourselves at 1000). A refresh cycle spends one
// ticker call plus one klines call per timeframe for every tracked symbol, so
// a long watch list refreshed quickly can get close.
//
// The tracker reads the `X-MBX-USED-WEIGHT-1M` response header after every
// request and keeps an atomic counter that any task may query lock-free.
// =============================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;

/// Length of the exchange weight window.
const WINDOW_MS: i64 = 60_000;

/// Weight of `GET /api/v3/ticker/24hr?symbol=...`.
pub const TICKER_WEIGHT: u32 = 2;
/// Weight of `GET /api/v3/klines` (any limit up to 1000).
pub const KLINES_WEIGHT: u32 = 2;

/// Thread-safe request-weight tracker backed by an atomic counter.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    /// When the counter was last refreshed from a response (ms since epoch).
    updated_at_ms: AtomicI64,
}

/// Snapshot of the current counter (suitable for the dashboard payload).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            updated_at_ms: AtomicI64::new(0),
        }
    }

    /// Update the counter from the response headers returned by Binance.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(w) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };
        self.record_used_weight(w, now_ms());
    }

    /// Store the exchange-reported weight for the current minute.
    pub fn record_used_weight(&self, w: u32, at_ms: i64) {
        let prev = self.used_weight_1m.swap(w, Ordering::Relaxed);
        self.updated_at_ms.store(at_ms, Ordering::Relaxed);
        if w >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = w,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = w, "rate-limit weight updated from header");
    }

    /// Reserve `weight` if it fits under the hard limit, otherwise return the
    /// current usage.
    ///
    /// Admitted weight is added to the counter so concurrent requests see each
    /// other before their responses arrive; the next header overwrites it with
    /// the exchange's figure. A reading older than the exchange window no
    /// longer applies and is reset.
    pub fn check(&self, weight: u32, at_ms: i64) -> Result<(), u32> {
        if at_ms - self.updated_at_ms.load(Ordering::Relaxed) >= WINDOW_MS {
            self.used_weight_1m.store(0, Ordering::Relaxed);
            self.updated_at_ms.store(at_ms, Ordering::Relaxed);
        }

        let reserved = self
            .used_weight_1m
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (current + weight <= WEIGHT_HARD_LIMIT).then_some(current + weight)
            });

        match reserved {
            Ok(_) => Ok(()),
            Err(current) => {
                warn!(
                    current_weight = current,
                    requested_weight = weight,
                    hard_limit = WEIGHT_HARD_LIMIT,
                    "request blocked — would exceed rate-limit"
                );
                Err(current)
            }
        }
    }

    fn current_weight(&self, at_ms: i64) -> u32 {
        let updated = self.updated_at_ms.load(Ordering::Relaxed);
        if at_ms - updated >= WINDOW_MS {
            return 0;
        }
        self.used_weight_1m.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        self.snapshot_at(now_ms())
    }

    fn snapshot_at(&self, at_ms: i64) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.current_weight(at_ms),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
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
