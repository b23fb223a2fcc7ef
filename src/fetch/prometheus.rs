//! Prometheus HTTP API Client
//!
//! Implements [`MetricsBackend`] over:
//! - `GET /api/v1/query_range`
//! - `GET /api/v1/query`
//! - `GET /api/v1/targets`
//! - `GET /api/v1/label/__name__/values`

use crate::fetch::backend::{MetricsBackend, Target};
use crate::fetch::error::{FetchError, FetchResult};
use crate::fetch::raw::RawResult;
use crate::series::Labels;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the Prometheus client
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Base URL (e.g., "http://localhost:9090")
    pub base_url: String,
    /// Timeout for range and instant queries, in seconds
    pub range_timeout_secs: u64,
    /// Timeout for targets and label lookups, in seconds
    pub metadata_timeout_secs: u64,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            range_timeout_secs: 60,
            metadata_timeout_secs: 15,
        }
    }
}

/// Prometheus REST API client
pub struct PrometheusClient {
    client: Client,
    config: PrometheusConfig,
}

impl PrometheusClient {
    /// Create a new client with the given configuration
    pub fn new(config: PrometheusConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("precedent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &PrometheusConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Issue a GET and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> FetchResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&self.config.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::Backend {
                status: status.as_u16(),
                message: text,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Run a query endpoint and reject error envelopes
    async fn query(&self, path: &str, params: &[(&str, String)]) -> FetchResult<RawResult> {
        let timeout = Duration::from_secs(self.config.range_timeout_secs);
        let raw: RawResult = self.get_json(path, params, timeout).await?;

        if !raw.is_success() {
            return Err(FetchError::QueryRejected {
                error_type: raw.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: raw.error.unwrap_or_default(),
            });
        }

        Ok(raw)
    }
}

#[async_trait]
impl MetricsBackend for PrometheusClient {
    fn name(&self) -> &str {
        &self.config.base_url
    }

    async fn query_range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step_seconds: i64,
    ) -> FetchResult<RawResult> {
        let params = [
            ("query", query.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("step", step_seconds.to_string()),
        ];
        self.query("/api/v1/query_range", &params).await
    }

    async fn query_instant(&self, query: &str, time: i64) -> FetchResult<RawResult> {
        let params = [("query", query.to_string()), ("time", time.to_string())];
        self.query("/api/v1/query", &params).await
    }

    async fn targets(&self) -> FetchResult<Vec<Target>> {
        let timeout = Duration::from_secs(self.config.metadata_timeout_secs);
        let envelope: Envelope<TargetsData> =
            self.get_json("/api/v1/targets", &[], timeout).await?;

        let data = envelope.into_data()?;
        Ok(data
            .active_targets
            .into_iter()
            .map(|t| Target {
                instance: t.labels.get("instance").cloned(),
                job: t.labels.get("job").cloned(),
                health: t.health,
                last_scrape: t.last_scrape,
                labels: t.labels,
            })
            .collect())
    }

    async fn metric_names(&self, matcher: &str) -> FetchResult<Vec<String>> {
        let timeout = Duration::from_secs(self.config.metadata_timeout_secs);
        let params = [("match[]", matcher.to_string())];
        let envelope: Envelope<Vec<String>> = self
            .get_json("/api/v1/label/__name__/values", &params, timeout)
            .await?;

        envelope.into_data()
    }
}

// ============================================
// Response DTOs
// ============================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: String,
    data: Option<T>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> FetchResult<T> {
        if self.status != "success" {
            return Err(FetchError::QueryRejected {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: self.error.unwrap_or_default(),
            });
        }
        self.data
            .ok_or_else(|| FetchError::Decode("missing data member".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TargetsData {
    #[serde(rename = "activeTargets", default)]
    active_targets: Vec<ActiveTarget>,
}

#[derive(Debug, Deserialize)]
struct ActiveTarget {
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    health: String,
    #[serde(rename = "lastScrape")]
    last_scrape: Option<String>,
}
