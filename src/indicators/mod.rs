// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free series math. Insufficient data never errors: scalar
// indicators return `Option<f64>` and series indicators return index-aligned
// `Vec<Option<f64>>` (or an empty vec when the window cannot be filled).

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::{calculate_ema, last_value};
pub use macd::calculate_macd;
pub use rsi::{calculate_rsi, RsiZone, RSI_PERIOD};
