//! Metrics backend seam
//!
//! The range fetcher only needs four calls from a backend. Production uses
//! [`PrometheusClient`](crate::fetch::PrometheusClient); tests plug in stubs.

use crate::fetch::error::FetchResult;
use crate::fetch::raw::RawResult;
use crate::series::Labels;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Read-only access to a Prometheus-compatible metrics backend
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Backend name used in logs and errors
    fn name(&self) -> &str;

    /// Range query over `[start, end]` (both inclusive) at `step_seconds` resolution
    async fn query_range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step_seconds: i64,
    ) -> FetchResult<RawResult>;

    /// Instant query evaluated at `time`
    async fn query_instant(&self, query: &str, time: i64) -> FetchResult<RawResult>;

    /// Currently active scrape targets
    async fn targets(&self) -> FetchResult<Vec<Target>>;

    /// Metric names that have at least one series matching `matcher`
    async fn metric_names(&self, matcher: &str) -> FetchResult<Vec<String>>;
}

/// An active scrape target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub instance: Option<String>,
    pub job: Option<String>,
    pub health: String,
    #[serde(rename = "lastScrape")]
    pub last_scrape: Option<String>,
    pub labels: Labels,
}
