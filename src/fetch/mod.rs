//! Metric history retrieval
//!
//! - [`PrometheusClient`]: HTTP client for the Prometheus query API
//! - [`RangeFetcher`]: splits long ranges into step-aligned chunks
//! - [`ChunkMerger`]: folds chunk results back into one response

mod backend;
mod error;
mod fetcher;
mod merge;
mod prometheus;
mod raw;
mod step;

pub use backend::{MetricsBackend, Target};
pub use error::{FetchError, FetchResult};
pub use fetcher::{plan_chunks, ChunkFailure, ChunkRange, FetchConfig, FetchOutcome, RangeFetcher};
pub use merge::ChunkMerger;
pub use prometheus::{PrometheusClient, PrometheusConfig};
pub use raw::{RawData, RawResult, RawSample, RawSeries};
pub use step::parse_step;
