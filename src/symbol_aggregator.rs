// =============================================================================
// Symbol Aggregator — one record per tracked symbol, one cycle per refresh
// =============================================================================
//
// For each symbol: fetch the live ticker first, then every configured
// timeframe concurrently. Timeframes fail independently; the symbol only
// fails as a whole when the ticker cannot be fetched. Successful snapshots go
// into the chart cache tagged with the cycle epoch.
//
// A refresh cycle runs every tracked symbol concurrently and publishes the
// resulting rows once all of them have settled.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::binance::rate_limit::now_ms;
use crate::chart_cache::ChartCache;
use crate::market_data::{reference_price, Kline, MarketDataError, MarketDataSource};
use crate::timeframe_analysis::{evaluate_timeframe, TimeframeSnapshot};
use crate::types::{format_pair, TimeframeSpec};

/// Interval whose klines provide the 24h reference price.
pub const CHANGE_REFERENCE_INTERVAL: &str = "1h";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

// =============================================================================
// Records
// =============================================================================

/// One board column for one symbol. `snapshot` is `None` when that timeframe
/// failed this cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeEntry {
    pub label: String,
    pub interval: String,
    pub snapshot: Option<Arc<TimeframeSnapshot>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolRecord {
    pub symbol: String,
    pub display_pair: String,
    pub last_price: f64,
    /// Percent change over 24h, see [`change_24h`].
    pub change_24h: Option<f64>,
    /// One entry per configured timeframe, in configured order.
    pub timeframes: Vec<TimeframeEntry>,
}

#[cfg(test)]
impl SymbolRecord {
    pub fn get(&self, label: &str) -> Option<&TimeframeEntry> {
        self.timeframes.iter().find(|t| t.label == label)
    }
}

/// A dashboard line: either a full record or the error that replaced it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardRow {
    Loaded(SymbolRecord),
    Failed {
        symbol: String,
        display_pair: String,
        error: String,
    },
}

impl DashboardRow {
    pub fn symbol(&self) -> &str {
        match self {
            DashboardRow::Loaded(record) => &record.symbol,
            DashboardRow::Failed { symbol, .. } => symbol,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DashboardRow::Failed { .. })
    }
}

// =============================================================================
// Per-symbol fetch
// =============================================================================

/// 24h percent change of `last_price` against the close nearest to
/// `now_ms - 24h`. `None` when no positive reference exists.
pub fn change_24h(klines: &[Kline], last_price: f64, now_ms: i64) -> Option<f64> {
    let reference = reference_price(klines, now_ms - DAY_MS)?;
    if reference > 0.0 && last_price.is_finite() {
        Some((last_price - reference) / reference * 100.0)
    } else {
        None
    }
}

/// Build the record for one symbol.
///
/// Returns an error only when the ticker fetch fails; timeframe failures are
/// logged and leave their entry empty (and their cache entry untouched).
pub async fn fetch_symbol_record(
    source: &dyn MarketDataSource,
    symbol: &str,
    timeframes: &[TimeframeSpec],
    kline_limit: u32,
    cache: &ChartCache,
    epoch: u64,
) -> Result<SymbolRecord, MarketDataError> {
    let ticker = source.fetch_ticker(symbol).await?;
    let live_price = ticker.last_price;

    let fetches = timeframes.iter().map(|tf| async move {
        let result = source
            .fetch_klines(symbol, &tf.interval, kline_limit)
            .await
            .and_then(|klines| {
                let snapshot = evaluate_timeframe(&klines, live_price)?;
                Ok((klines, snapshot))
            });
        (tf, result)
    });
    let results = join_all(fetches).await;

    let now = now_ms();
    let mut change = None;
    let mut entries = Vec::with_capacity(results.len());

    for (tf, result) in results {
        let snapshot = match result {
            Ok((klines, snapshot)) => {
                if tf.interval == CHANGE_REFERENCE_INTERVAL {
                    change = change_24h(&klines, live_price, now);
                }
                let snapshot = Arc::new(snapshot);
                cache.store(symbol, &tf.interval, Arc::clone(&snapshot), epoch);
                Some(snapshot)
            }
            Err(e) => {
                warn!(symbol, timeframe = %tf, error = %e, "timeframe evaluation failed");
                None
            }
        };
        entries.push(TimeframeEntry {
            label: tf.label.clone(),
            interval: tf.interval.clone(),
            snapshot,
        });
    }

    Ok(SymbolRecord {
        symbol: symbol.to_string(),
        display_pair: format_pair(symbol),
        last_price: live_price,
        change_24h: change.or(ticker.price_change_percent),
        timeframes: entries,
    })
}

async fn build_row(
    source: &dyn MarketDataSource,
    symbol: &str,
    timeframes: &[TimeframeSpec],
    kline_limit: u32,
    cache: &ChartCache,
    epoch: u64,
) -> DashboardRow {
    match fetch_symbol_record(source, symbol, timeframes, kline_limit, cache, epoch).await {
        Ok(record) => DashboardRow::Loaded(record),
        Err(e) => {
            warn!(symbol, error = %e, "symbol refresh failed");
            DashboardRow::Failed {
                symbol: symbol.to_string(),
                display_pair: format_pair(symbol),
                error: e.to_string(),
            }
        }
    }
}

// =============================================================================
// Refresh cycle
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub epoch: u64,
    pub symbols: usize,
    pub failed: usize,
    /// False when a newer cycle had already published.
    pub published: bool,
}

/// Refresh every tracked symbol and publish the rows.
pub async fn run_refresh_cycle(state: &AppState) -> CycleReport {
    let epoch = state.begin_cycle();
    let symbols = state.tracked_symbols();
    let (timeframes, kline_limit) = {
        let config = state.runtime_config.read();
        (config.timeframes.clone(), config.kline_limit)
    };
    let started = Instant::now();

    let source = state.market_data.as_ref();
    let rows = join_all(
        symbols
            .iter()
            .map(|s| build_row(source, s, &timeframes, kline_limit, &state.chart_cache, epoch)),
    )
    .await;

    let failed = rows.iter().filter(|r| r.is_failed()).count();
    for row in &rows {
        if let DashboardRow::Failed { symbol, error, .. } = row {
            state.push_error_with_symbol(error.clone(), Some(symbol.clone()));
        }
    }

    let published = state.publish_rows(epoch, rows);

    info!(
        epoch,
        symbols = symbols.len(),
        failed,
        published,
        cached_symbols = state.chart_cache.symbol_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "refresh cycle complete"
    );

    CycleReport {
        epoch,
        symbols: symbols.len(),
        failed,
        published,
    }
}
