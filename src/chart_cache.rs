// ---------------------------------------------------------------------------
// ChartCache — latest successful snapshot per (symbol, interval)
// ---------------------------------------------------------------------------
//
// Entries are overwritten on success and left stale when a timeframe fails,
// so the chart keeps showing the last known state. Untracking a symbol drops
// every interval for it. There is no other eviction: the key space is the
// user's watch list.
//
// Writers carry the epoch of the refresh cycle that produced the snapshot.
// A write older than the stored entry, or not newer than the symbol's removal,
// is discarded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::timeframe_analysis::TimeframeSnapshot;

#[derive(Debug, Clone)]
struct CachedSnapshot {
    epoch: u64,
    snapshot: Arc<TimeframeSnapshot>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, HashMap<String, CachedSnapshot>>,
    /// Epoch at which each symbol was last removed.
    removed_at: HashMap<String, u64>,
}

/// Thread-safe chart cache shared by the refresh cycles and the API.
#[derive(Default)]
pub struct ChartCache {
    inner: RwLock<Inner>,
}

impl ChartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot` for `symbol`/`interval` as produced by cycle `epoch`.
    ///
    /// Returns `false` when the write was discarded as stale.
    pub fn store(&self, symbol: &str, interval: &str, snapshot: Arc<TimeframeSnapshot>, epoch: u64) -> bool {
        let mut inner = self.inner.write();

        if inner.removed_at.get(symbol).is_some_and(|&removed| epoch <= removed) {
            debug!(symbol, interval, epoch, "chart cache write after removal discarded");
            return false;
        }

        let per_symbol = inner.entries.entry(symbol.to_string()).or_default();
        if per_symbol.get(interval).is_some_and(|cached| cached.epoch > epoch) {
            debug!(symbol, interval, epoch, "stale chart cache write discarded");
            return false;
        }

        per_symbol.insert(interval.to_string(), CachedSnapshot { epoch, snapshot });
        true
    }

    pub fn get(&self, symbol: &str, interval: &str) -> Option<Arc<TimeframeSnapshot>> {
        let inner = self.inner.read();
        inner
            .entries
            .get(symbol)
            .and_then(|m| m.get(interval))
            .map(|c| Arc::clone(&c.snapshot))
    }

    /// Intervals currently cached for `symbol`, sorted.
    pub fn intervals(&self, symbol: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut intervals: Vec<String> = inner
            .entries
            .get(symbol)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        intervals.sort();
        intervals
    }

    /// Drop every interval for `symbol`. Cycles with an epoch up to and
    /// including `epoch` can no longer write entries for it.
    pub fn remove_symbol(&self, symbol: &str, epoch: u64) -> usize {
        let mut inner = self.inner.write();
        inner.removed_at.insert(symbol.to_string(), epoch);
        inner.entries.remove(symbol).map_or(0, |m| m.len())
    }

    pub fn symbol_count(&self) -> usize {
        self.inner.read().entries.len()
    }
}
