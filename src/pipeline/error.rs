//! Pipeline error types

use crate::analysis::AnalysisError;
use crate::fetch::FetchError;
use crate::index::IndexError;
use crate::series::NormalizeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Analysis setup failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// The query matched no series
    #[error("No data found for metric {metric}")]
    NoData { metric: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
