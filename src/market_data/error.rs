// =============================================================================
// Market-data error taxonomy
// =============================================================================
//
// The aggregator needs to tell these apart: every variant is scoped to one
// symbol or one timeframe and none of them is fatal to the process.
// Insufficient indicator data is not an error at all (see `indicators`).
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketDataError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The exchange answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// The payload did not have the expected shape.
    #[error("malformed {endpoint} payload: {reason}")]
    Malformed {
        endpoint: &'static str,
        reason: String,
    },

    /// The payload was well-formed but carried no usable rows.
    #[error("{endpoint} returned no usable data")]
    EmptyPayload { endpoint: &'static str },

    /// The data source does not recognise the identifier.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Sending the request would exceed the request-weight budget.
    #[error("request weight budget exhausted ({used} used)")]
    RateLimited { used: u32 },
}

impl MarketDataError {
    pub fn malformed(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            endpoint,
            reason: reason.into(),
        }
    }
}
