// =============================================================================
// Signal Board — Main Entry Point
// =============================================================================
//
// Tracks a watch list of USDT spot pairs, refreshes RSI / EMA / MACD signals
// across the configured timeframes on a timer, and serves the board over
// REST + WebSocket alongside the static dashboard page.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod chart_cache;
mod indicators;
mod market_data;
mod runtime_config;
mod scheduler;
mod signals;
mod symbol_aggregator;
mod timeframe_analysis;
mod tracked_symbols;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::runtime_config::RuntimeConfig;
use crate::tracked_symbols::TrackedSymbols;

const CONFIG_PATH: &str = "signal_board.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Signal Board starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    let tracked = TrackedSymbols::load(&config.symbols_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load tracked symbols, using defaults");
        TrackedSymbols::default()
    });

    info!(
        count = tracked.len(),
        symbols = ?tracked.as_slice(),
        timeframes = ?config.timeframes.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        refresh_interval_secs = config.refresh_interval_secs,
        "Board configured"
    );

    // ── 2. Market data client ────────────────────────────────────────────
    let binance_client = BinanceClient::new(
        config.binance_base_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let bind_addr = config.bind_addr.clone();

    // ── 3. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(
        config,
        CONFIG_PATH,
        tracked,
        Arc::new(binance_client),
    ));

    // ── 4. Auto-refresh ──────────────────────────────────────────────────
    let scheduler = scheduler::spawn(state.clone());

    // ── 5. HTTP server ───────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    scheduler.abort();
    server.abort();

    let config = state.runtime_config.read().clone();
    if let Err(e) = config.save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }
    let tracked = state.tracked.read().clone();
    if let Err(e) = tracked.save(&config.symbols_path) {
        error!(error = %e, "Failed to save tracked symbols on shutdown");
    }

    info!("Signal Board shut down complete.");
    Ok(())
}
