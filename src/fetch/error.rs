//! Fetch error types

use thiserror::Error;

/// Errors raised while talking to the metrics backend
#[derive(Error, Debug)]
pub enum FetchError {
    /// Backend could not be reached (connection refused, DNS, TLS)
    #[error("Metrics backend {backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Backend did not answer within the request timeout
    #[error("Metrics backend {backend} timed out")]
    Timeout { backend: String },

    /// Backend answered with a non-2xx status
    #[error("Metrics backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// Backend answered 2xx but reported a query error in the envelope
    #[error("Query rejected ({error_type}): {message}")]
    QueryRejected { error_type: String, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    /// Other request failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Step string could not be parsed
    #[error("Invalid step: {0:?}")]
    InvalidStep(String),

    /// End of range precedes its start
    #[error("Invalid time range: start={start}, end={end}")]
    InvalidRange { start: i64, end: i64 },

    /// Caller abandoned the fetch between chunks
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Classify a transport error the way every backend client does
    pub(crate) fn from_transport(backend: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                backend: backend.to_string(),
            }
        } else if err.is_connect() {
            FetchError::BackendUnavailable {
                backend: backend.to_string(),
                reason: err.to_string(),
            }
        } else {
            FetchError::Request(err)
        }
    }

    /// Backend unreachable or too slow, as opposed to a bad query
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            FetchError::BackendUnavailable { .. } | FetchError::Timeout { .. }
        )
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;
