// =============================================================================
// Central Application State — Signal Board
// =============================================================================
//
// The single source of truth for the service. Owned by `main` as
// `Arc<AppState>` and shared with the scheduler, the refresh cycles and the
// HTTP/WebSocket layer.
//
// Thread safety:
//   - Atomic counters for lock-free version and epoch tracking.
//   - parking_lot::RwLock for all mutable shared collections, held only for
//     short synchronous sections (never across an await).
//   - The market-data source is a shared trait object.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::binance::rate_limit::RateLimitSnapshot;
use crate::chart_cache::ChartCache;
use crate::market_data::MarketDataSource;
use crate::runtime_config::{validate_refresh_interval, RuntimeConfig};
use crate::symbol_aggregator::DashboardRow;
use crate::tracked_symbols::{normalize_symbol, AddOutcome, TrackedSymbols};
use crate::types::TimeframeSpec;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Symbol the error belongs to, if any.
    pub symbol: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Rows published by the newest completed refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub epoch: u64,
    pub rows: Vec<DashboardRow>,
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every change a dashboard client can observe. The
    /// WebSocket feed pushes a new snapshot whenever it moves.
    pub state_version: AtomicU64,

    /// Epoch of the most recently started refresh cycle.
    pub refresh_epoch: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub config_path: PathBuf,

    // ── Watch list ──────────────────────────────────────────────────────
    pub tracked: RwLock<TrackedSymbols>,

    // ── Results ─────────────────────────────────────────────────────────
    pub chart_cache: ChartCache,
    pub dashboard: RwLock<DashboardState>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Market data ─────────────────────────────────────────────────────
    pub market_data: Arc<dyn MarketDataSource>,

    // ── Scheduling ──────────────────────────────────────────────────────
    /// Signalled when the auto-refresh period changes.
    pub schedule_changed: Notify,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        config_path: impl Into<PathBuf>,
        tracked: TrackedSymbols,
        market_data: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            refresh_epoch: AtomicU64::new(0),
            runtime_config: Arc::new(RwLock::new(config)),
            config_path: config_path.into(),
            tracked: RwLock::new(tracked),
            chart_cache: ChartCache::new(),
            dashboard: RwLock::new(DashboardState::default()),
            recent_errors: RwLock::new(Vec::new()),
            market_data,
            schedule_changed: Notify::new(),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Refresh epochs ──────────────────────────────────────────────────

    /// Start a new refresh cycle and return its epoch (1-based).
    pub fn begin_cycle(&self) -> u64 {
        self.refresh_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_epoch(&self) -> u64 {
        self.refresh_epoch.load(Ordering::SeqCst)
    }

    /// Publish the rows of cycle `epoch`.
    ///
    /// Discarded when a newer cycle has already published. Rows for symbols
    /// untracked while the cycle was running are dropped.
    pub fn publish_rows(&self, epoch: u64, rows: Vec<DashboardRow>) -> bool {
        let tracked = self.tracked.read();
        let mut dashboard = self.dashboard.write();

        if epoch < dashboard.epoch {
            debug!(epoch, published = dashboard.epoch, "stale refresh cycle discarded");
            return false;
        }

        dashboard.epoch = epoch;
        dashboard.rows = rows.into_iter().filter(|r| tracked.contains(r.symbol())).collect();
        dashboard.updated_at = Some(Utc::now());
        drop(dashboard);
        drop(tracked);

        self.increment_version();
        true
    }

    // ── Error Logging ───────────────────────────────────────────────────

    pub fn push_error(&self, msg: String) {
        self.push_error_with_symbol(msg, None);
    }

    /// Record an error. The log is capped at [`MAX_RECENT_ERRORS`]; oldest
    /// entries are evicted first.
    pub fn push_error_with_symbol(&self, msg: String, symbol: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            symbol,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Watch list ──────────────────────────────────────────────────────

    pub fn tracked_symbols(&self) -> Vec<String> {
        self.tracked.read().as_slice().to_vec()
    }

    /// Add a symbol from raw user input and persist the list when it
    /// changed.
    pub fn add_symbol(&self, raw: &str) -> AddOutcome {
        let outcome = self.tracked.write().add(raw);
        match &outcome {
            AddOutcome::Added(symbol) => {
                info!(symbol = %symbol, "symbol tracked");
                self.persist_symbols();
                self.increment_version();
            }
            AddOutcome::AlreadyTracked(symbol) => {
                debug!(symbol = %symbol, "symbol already tracked");
            }
            AddOutcome::Invalid => {
                debug!(raw, "rejected empty symbol");
            }
        }
        outcome
    }

    /// Stop tracking a symbol: persist the list, clear its chart cache and
    /// drop its dashboard row. Returns the normalised symbol when it was
    /// tracked.
    pub fn remove_symbol(&self, raw: &str) -> Option<String> {
        let symbol = normalize_symbol(raw)?;
        if !self.tracked.write().remove(&symbol) {
            return None;
        }

        self.persist_symbols();
        let dropped = self.chart_cache.remove_symbol(&symbol, self.current_epoch());
        self.dashboard.write().rows.retain(|r| r.symbol() != symbol);
        self.increment_version();

        info!(symbol = %symbol, cached_intervals = dropped, "symbol untracked");
        Some(symbol)
    }

    fn persist_symbols(&self) {
        let path = self.runtime_config.read().symbols_path.clone();
        let list = self.tracked.read().clone();
        if let Err(e) = list.save(&path) {
            warn!(path = %path, error = %e, "failed to persist tracked symbols");
            self.push_error(format!("failed to persist tracked symbols: {e:#}"));
        }
    }

    // ── Auto-refresh period ─────────────────────────────────────────────

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.runtime_config.read().refresh_interval_secs)
    }

    /// Change the auto-refresh period, persist the config and wake the
    /// scheduler so the next tick uses the new period.
    pub fn set_refresh_interval(&self, secs: u64) -> Result<u64, String> {
        let secs = validate_refresh_interval(secs)?;

        let config = {
            let mut config = self.runtime_config.write();
            config.refresh_interval_secs = secs;
            config.clone()
        };
        if let Err(e) = config.save(&self.config_path) {
            warn!(path = %self.config_path.display(), error = %e, "failed to persist runtime config");
        }

        info!(refresh_interval_secs = secs, "auto-refresh period changed");
        self.schedule_changed.notify_one();
        self.increment_version();
        Ok(secs)
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable view of the board, served by `GET /api/v1/dashboard`
    /// and pushed over the WebSocket feed.
    pub fn build_snapshot(&self) -> DashboardSnapshot {
        let symbols = self.tracked_symbols();
        let config = self.runtime_config.read();
        let dashboard = self.dashboard.read();

        DashboardSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            epoch: dashboard.epoch,
            updated_at: dashboard.updated_at.map(|t| t.to_rfc3339()),
            refresh_interval_secs: config.refresh_interval_secs,
            timeframes: config.timeframes.clone(),
            symbols,
            rows: dashboard.rows.clone(),
            recent_errors: self.recent_errors.read().clone(),
            request_weight: self.market_data.request_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    /// Epoch of the cycle that produced `rows`; 0 before the first cycle.
    pub epoch: u64,
    pub updated_at: Option<String>,
    pub refresh_interval_secs: u64,
    pub timeframes: Vec<TimeframeSpec>,
    pub symbols: Vec<String>,
    pub rows: Vec<DashboardRow>,
    pub recent_errors: Vec<ErrorRecord>,
    pub request_weight: Option<RateLimitSnapshot>,
}
