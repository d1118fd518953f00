pub mod error;
pub mod kline;
pub mod source;

// Re-export the common types for convenient access (e.g. `use crate::market_data::Kline`).
pub use error::MarketDataError;
pub use kline::{finite_closes, parse_klines, reference_price, Kline};
pub use source::{MarketDataSource, Ticker};
