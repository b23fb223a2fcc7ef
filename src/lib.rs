//! # Precedent
//!
//! Metric anomaly analysis backed by historical precedent. Months of metric
//! history are pulled from Prometheus in bounded chunks, cut into fixed
//! windows, turned into fixed-length feature vectors and stored in a vector
//! index. A recent window is then explained with the help of the most similar
//! historical windows.
//!
//! ## Modules
//!
//! - [`fetch`]: Chunked range retrieval from the metrics backend
//! - [`series`]: Normalization into sorted time series and segmentation
//! - [`encode`]: Shape-preserving vector encoding
//! - [`index`]: Vector index backends (memory, SQLite, Milvus)
//! - [`context`]: Similar-segment retrieval and rehydration
//! - [`analysis`]: Generative analysis with a statistical fallback
//! - [`pipeline`]: Ingest and analyze runs wiring it all together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use precedent::{Config, Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let pipeline = Pipeline::from_config(&config)?;
//!     let cancel = CancellationToken::new();
//!
//!     // Index the history, then explain the last few hours
//!     let ingest = pipeline.ingest("node_load1", None, &cancel).await?;
//!     println!("Indexed {} segments", ingest.inserted);
//!
//!     let report = pipeline.analyze("node_load1", None, &cancel).await?;
//!     println!("{}", report.result.title());
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod context;
pub mod encode;
pub mod fetch;
pub mod index;
pub mod pipeline;
pub mod series;

#[cfg(test)]
pub(crate) mod testing;

// Re-export top-level types for convenience
pub use fetch::{
    FetchConfig, FetchError, FetchOutcome, FetchResult, MetricsBackend, PrometheusClient,
    PrometheusConfig, RangeFetcher, RawResult,
};

pub use series::{to_series, Labels, NormalizeError, Point, Segment, SegmentConfig, Segmenter, Series};

pub use encode::{EncoderConfig, FeatureVector, VectorEncoder};

pub use index::{
    IndexError, IndexResult, MemoryIndex, MilvusConfig, MilvusIndex, SearchHit, SegmentRecord,
    SqliteIndex, VectorIndex,
};

pub use context::{ContextConfig, ContextMatch, ContextRetriever, RehydratedMatch};

pub use analysis::{
    AnalysisError, AnalysisRequest, AnalysisResult, Analyst, EnvInfo, FallbackEstimator,
    Generator, OllamaConfig, OllamaGenerator,
};

pub use pipeline::{
    AnalysisReport, IngestReport, Pipeline, PipelineConfig, PipelineError, PipelineResult,
    TargetsReport,
};

pub use config::{generate_default_config, Config, ConfigError, LoggingConfig};
