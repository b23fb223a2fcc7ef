//! Vector index error types

use thiserror::Error;

/// Errors raised by vector index backends
#[derive(Error, Debug)]
pub enum IndexError {
    /// Index could not be reached
    #[error("Vector index {backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    /// Index did not answer within the request timeout
    #[error("Vector index {backend} timed out")]
    Timeout { backend: String },

    /// Other request failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Index answered with an error payload or non-2xx status
    #[error("Vector index API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Vector dimension does not match the collection
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Local SQLite store failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Vector blob could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while opening a local index
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    /// Blocking database task panicked or was cancelled
    #[error("Blocking task failed: {0}")]
    Task(String),
}

impl IndexError {
    /// Classify a transport error
    pub(crate) fn from_transport(backend: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IndexError::Timeout {
                backend: backend.to_string(),
            }
        } else if err.is_connect() {
            IndexError::Unavailable {
                backend: backend.to_string(),
                reason: err.to_string(),
            }
        } else {
            IndexError::Request(err)
        }
    }

    /// True when the index could not be reached at all
    ///
    /// Callers degrade gracefully on these instead of failing the run.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, IndexError::Unavailable { .. } | IndexError::Timeout { .. })
    }
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
