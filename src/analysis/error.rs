//! Analysis error types

use thiserror::Error;

/// Errors from the generative analysis backend
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Generator {backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("Generator {backend} timed out")]
    Timeout { backend: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Generator returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The model answered, but not with the expected JSON object
    #[error("Unparsable generator output: {0}")]
    InvalidResponse(String),
}

impl AnalysisError {
    pub(crate) fn from_transport(backend: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::Timeout {
                backend: backend.to_string(),
            }
        } else if err.is_connect() {
            AnalysisError::Unavailable {
                backend: backend.to_string(),
                reason: err.to_string(),
            }
        } else {
            AnalysisError::Request(err)
        }
    }
}
