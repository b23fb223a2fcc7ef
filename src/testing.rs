//! Test doubles shared across module tests

use crate::encode::FeatureVector;
use crate::fetch::{FetchError, FetchResult, MetricsBackend, RawResult, RawSample, RawSeries, Target};
use crate::index::{IndexError, IndexResult, SearchHit, SegmentRecord, VectorIndex};
use crate::series::Labels;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// In-process metrics backend producing deterministic series
///
/// Every range query yields one series per configured instance, sampled at
/// `start + k * step` up to and including `end`. Values depend only on the
/// timestamp and series index, so chunked and single fetches are comparable.
pub(crate) struct StubBackend {
    instances: Vec<String>,
    failing: Vec<i64>,
    delays: HashMap<i64, u64>,
    unreachable: bool,
    calls: Mutex<Vec<(i64, i64)>>,
}

impl StubBackend {
    pub(crate) fn new(instances: &[&str]) -> Self {
        Self {
            instances: instances.iter().map(|s| s.to_string()).collect(),
            failing: Vec::new(),
            delays: HashMap::new(),
            unreachable: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backend whose every call fails with a connection error
    pub(crate) fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new(&[])
        }
    }

    /// Fail range queries starting at `start` with a 503
    pub(crate) fn failing_at(mut self, start: i64) -> Self {
        self.failing.push(start);
        self
    }

    /// Delay range queries starting at `start`
    pub(crate) fn delayed_at(mut self, start: i64, millis: u64) -> Self {
        self.delays.insert(start, millis);
        self
    }

    /// `(start, end)` of every range query received, in arrival order
    pub(crate) fn calls(&self) -> Vec<(i64, i64)> {
        self.calls.lock().unwrap().clone()
    }

    fn labels(&self, query: &str, instance: &str) -> Labels {
        let mut labels = Labels::new();
        labels.insert("__name__".to_string(), query.to_string());
        labels.insert("instance".to_string(), instance.to_string());
        labels.insert("job".to_string(), "stub".to_string());
        labels
    }

    fn unavailable(&self) -> FetchError {
        FetchError::BackendUnavailable {
            backend: "stub".to_string(),
            reason: "connection refused".to_string(),
        }
    }
}

/// Sine with a period of about 94 minutes, offset by the series index
pub(crate) fn stub_value(index: usize, ts: i64) -> f64 {
    (ts.rem_euclid(86_400) as f64 / 900.0).sin() * 10.0 + index as f64
}

#[async_trait]
impl MetricsBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn query_range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step_seconds: i64,
    ) -> FetchResult<RawResult> {
        self.calls.lock().unwrap().push((start, end));

        if let Some(&millis) = self.delays.get(&start) {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        if self.unreachable {
            return Err(self.unavailable());
        }
        if self.failing.contains(&start) {
            return Err(FetchError::Backend {
                status: 503,
                message: "overloaded".to_string(),
            });
        }

        let result = self
            .instances
            .iter()
            .enumerate()
            .map(|(i, instance)| RawSeries {
                metric: self.labels(query, instance),
                values: Some(
                    (start..=end)
                        .step_by(step_seconds as usize)
                        .map(|ts| RawSample::new(ts, stub_value(i, ts)))
                        .collect(),
                ),
                value: None,
            })
            .collect();
        Ok(RawResult::matrix(result))
    }

    async fn query_instant(&self, query: &str, time: i64) -> FetchResult<RawResult> {
        if self.unreachable {
            return Err(self.unavailable());
        }
        let mut raw = RawResult::matrix(
            self.instances
                .iter()
                .enumerate()
                .map(|(i, instance)| RawSeries {
                    metric: self.labels(query, instance),
                    values: None,
                    value: Some(RawSample::new(time, stub_value(i, time))),
                })
                .collect(),
        );
        raw.data.result_type = "vector".to_string();
        Ok(raw)
    }

    async fn targets(&self) -> FetchResult<Vec<Target>> {
        if self.unreachable {
            return Err(self.unavailable());
        }
        Ok(self
            .instances
            .iter()
            .map(|instance| {
                let mut labels = Labels::new();
                labels.insert("instance".to_string(), instance.clone());
                labels.insert("job".to_string(), "stub".to_string());
                Target {
                    instance: Some(instance.clone()),
                    job: Some("stub".to_string()),
                    health: "up".to_string(),
                    last_scrape: None,
                    labels,
                }
            })
            .collect())
    }

    async fn metric_names(&self, _matcher: &str) -> FetchResult<Vec<String>> {
        if self.unreachable {
            return Err(self.unavailable());
        }
        Ok(vec!["node_load1".to_string(), "up".to_string()])
    }
}

/// Vector index that is never reachable
pub(crate) struct UnavailableIndex;

impl UnavailableIndex {
    fn error() -> IndexError {
        IndexError::Unavailable {
            backend: "offline".to_string(),
            reason: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl VectorIndex for UnavailableIndex {
    fn name(&self) -> &str {
        "offline"
    }

    fn dim(&self) -> usize {
        128
    }

    async fn ensure_collection(&self) -> IndexResult<()> {
        Err(Self::error())
    }

    async fn insert(&self, _records: Vec<SegmentRecord>) -> IndexResult<usize> {
        Err(Self::error())
    }

    async fn search(&self, _vector: &FeatureVector, _top_k: usize) -> IndexResult<Vec<SearchHit>> {
        Err(Self::error())
    }
}
