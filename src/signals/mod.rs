// =============================================================================
// Signals Module
// =============================================================================
//
// Discrete classifications derived from indicator series:
// - Crossover detection between two paired series
// - Three-state trend from price vs EMA21 vs EMA50

pub mod cross;
pub mod trend;

pub use cross::{detect_series_cross, CrossSignal};
pub use trend::{calculate_trend, TrendSignal};
