use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::MarketDataError;
use super::kline::Kline;
use crate::binance::rate_limit::RateLimitSnapshot;

/// Live 24h ticker for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Symbol as echoed back by the exchange.
    pub symbol: String,
    pub last_price: f64,
    /// Exchange-computed rolling 24h change, used when no 1h reference price
    /// is available.
    pub price_change_percent: Option<f64>,
}

/// Where the aggregator gets its prices from.
///
/// `BinanceClient` is the production implementation; tests substitute an
/// in-memory source.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError>;

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, MarketDataError>;

    /// Current request-weight usage, for sources that are rate limited.
    fn request_weight(&self) -> Option<RateLimitSnapshot> {
        None
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory [`MarketDataSource`] for aggregator, state and API tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::RwLock;

    use super::*;

    #[derive(Default)]
    pub struct StaticSource {
        pub tickers: RwLock<HashMap<String, Ticker>>,
        pub klines: RwLock<HashMap<(String, String), Vec<Kline>>>,
        pub failing_intervals: RwLock<HashSet<String>>,
        pub kline_calls: AtomicUsize,
    }

    impl StaticSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register `symbol` at `last_price` with the same closes on every
        /// interval in `intervals`, one minute apart.
        pub fn with_symbol(self, symbol: &str, last_price: f64, closes: &[f64], intervals: &[&str]) -> Self {
            self.tickers.write().insert(
                symbol.to_string(),
                Ticker {
                    symbol: symbol.to_string(),
                    last_price,
                    price_change_percent: Some(1.5),
                },
            );
            let rows: Vec<Kline> = closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Kline::new(c, (i as i64 + 1) * 60_000))
                .collect();
            for interval in intervals {
                self.klines
                    .write()
                    .insert((symbol.to_string(), interval.to_string()), rows.clone());
            }
            self
        }

        pub fn fail_interval(self, interval: &str) -> Self {
            self.failing_intervals.write().insert(interval.to_string());
            self
        }
    }

    #[async_trait]
    impl MarketDataSource for StaticSource {
        async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError> {
            self.tickers
                .read()
                .get(symbol)
                .cloned()
                .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))
        }

        async fn fetch_klines(
            &self,
            symbol: &str,
            interval: &str,
            limit: u32,
        ) -> Result<Vec<Kline>, MarketDataError> {
            self.kline_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_intervals.read().contains(interval) {
                return Err(MarketDataError::Status {
                    endpoint: "klines",
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let rows = self
                .klines
                .read()
                .get(&(symbol.to_string(), interval.to_string()))
                .cloned()
                .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
            let start = rows.len().saturating_sub(limit as usize);
            Ok(rows[start..].to_vec())
        }
    }
}
