// =============================================================================
// Binance REST API Client — public market-data endpoints
// =============================================================================
//
// Only unauthenticated endpoints are used (24h ticker and klines), so no API
// key or request signing is involved. Every response feeds the request-weight
// tracker before its body is inspected.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::rate_limit::{now_ms, RateLimitSnapshot, RateLimitTracker, KLINES_WEIGHT, TICKER_WEIGHT};
use crate::market_data::kline::parse_number;
use crate::market_data::{parse_klines, Kline, MarketDataError, MarketDataSource, Ticker};

/// Binance error code for an unrecognised symbol.
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Binance spot REST client for the public market-data endpoints.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: std::sync::Arc<RateLimitTracker>,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `BinanceClient` against `base_url`
    /// (normally `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: std::sync::Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn rate_limit(&self) -> RateLimitSnapshot {
        self.rate_limit.snapshot()
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/ticker/24hr for a single symbol.
    #[instrument(skip(self), name = "binance::get_ticker")]
    pub async fn get_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let body = self
            .get_json("ticker/24hr", &url, &[("symbol", symbol)], TICKER_WEIGHT)
            .await
            .map_err(|e| unknown_symbol_on_invalid(e, symbol))?;

        let ticker = parse_ticker(&body)?;
        debug!(symbol = %ticker.symbol, last_price = ticker.last_price, "ticker fetched");
        Ok(ticker)
    }

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Returns the rows parsed down to close price and close time; see
    /// [`parse_klines`] for the accepted payload shape.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, MarketDataError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.to_string();
        let body = self
            .get_json(
                "klines",
                &url,
                &[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())],
                KLINES_WEIGHT,
            )
            .await
            .map_err(|e| unknown_symbol_on_invalid(e, symbol))?;

        let klines = parse_klines(&body)?;
        debug!(symbol, interval, count = klines.len(), "klines fetched");
        Ok(klines)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    async fn get_json(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, &str)],
        weight: u32,
    ) -> Result<serde_json::Value, MarketDataError> {
        self.rate_limit
            .check(weight, now_ms())
            .map_err(|used| MarketDataError::RateLimited { used })?;

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| MarketDataError::Http { endpoint, source })?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|source| MarketDataError::Http { endpoint, source })?;

        if !status.is_success() {
            return Err(MarketDataError::Status {
                endpoint,
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| MarketDataError::malformed(endpoint, format!("invalid JSON: {e}")))
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError> {
        self.get_ticker(symbol).await
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, MarketDataError> {
        self.get_klines(symbol, interval, limit).await
    }

    fn request_weight(&self) -> Option<RateLimitSnapshot> {
        Some(self.rate_limit())
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// Map Binance's "Invalid symbol." error body onto [`MarketDataError::UnknownSymbol`].
fn unknown_symbol_on_invalid(err: MarketDataError, symbol: &str) -> MarketDataError {
    let invalid_symbol = match &err {
        MarketDataError::Status { body, .. } => serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(|c| c.as_i64()))
            == Some(INVALID_SYMBOL_CODE),
        _ => false,
    };
    if invalid_symbol {
        MarketDataError::UnknownSymbol(symbol.to_string())
    } else {
        err
    }
}

/// Parse a 24h ticker body. A missing `symbol` field means the exchange did
/// not identify the pair.
fn parse_ticker(body: &serde_json::Value) -> Result<Ticker, MarketDataError> {
    let symbol = body
        .get("symbol")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MarketDataError::UnknownSymbol("<unidentified>".to_string()))?;

    let last_price = parse_number(&body["lastPrice"])
        .ok_or_else(|| MarketDataError::malformed("ticker/24hr", "missing or invalid lastPrice"))?;

    Ok(Ticker {
        symbol: symbol.to_string(),
        last_price,
        price_change_percent: parse_number(&body["priceChangePercent"]),
    })
}
