//! Ingest and Analyze Pipeline
//!
//! Wires the components together:
//!
//! ```text
//! ingest:  RangeFetcher → to_series → Segmenter → VectorEncoder → VectorIndex::insert
//! analyze: RangeFetcher → to_series → VectorEncoder → ContextRetriever → Analyst
//! ```
//!
//! Each run is tagged with a random run id on its tracing span.

mod demo;
mod error;

pub use demo::{demo_recent_points, demo_segments};
pub use error::{PipelineError, PipelineResult};

use crate::analysis::{
    resolve_env, AnalysisRequest, AnalysisResult, Analyst, EnvInfo, FallbackEstimator, Generator,
    OllamaGenerator,
};
use crate::config::Config;
use crate::context::{ContextConfig, ContextRetriever, RehydratedMatch};
use crate::encode::{EncoderConfig, VectorEncoder};
use crate::fetch::{ChunkFailure, FetchConfig, MetricsBackend, PrometheusClient, RangeFetcher, Target};
use crate::index::{MemoryIndex, MilvusIndex, SegmentRecord, SqliteIndex, VectorIndex};
use crate::series::{to_series, Labels, Point, SegmentConfig, Segmenter};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Metrics listed when no instance filter is given
const COMMON_METRICS: &[&str] = &[
    "up",
    "node_load1",
    "node_load5",
    "node_load15",
    "node_memory_MemAvailable_bytes",
    "node_memory_MemTotal_bytes",
    "node_cpu_seconds_total",
    "node_filesystem_avail_bytes",
    "node_network_receive_bytes_total",
    "node_network_transmit_bytes_total",
    "process_resident_memory_bytes",
    "go_goroutines",
];

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// History indexed by `ingest`
    pub ingest_days: i64,
    /// Recent window examined by `analyze`
    pub analyze_hours: i64,
    pub default_step: String,
    pub segment: SegmentConfig,
    pub encoder: EncoderConfig,
    pub context: ContextConfig,
    pub hosts: HashMap<String, EnvInfo>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest_days: 15,
            analyze_hours: 6,
            default_step: "60s".to_string(),
            segment: SegmentConfig::default(),
            encoder: EncoderConfig::default(),
            context: ContextConfig::default(),
            hosts: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ingest_days: config.prometheus.ingest_days,
            analyze_hours: config.pipeline.analyze_hours,
            default_step: config.prometheus.range_step.clone(),
            segment: config.segment_config(),
            encoder: config.encoder_config(),
            context: config.context_config(),
            hosts: config.hosts.clone(),
        }
    }
}

/// Outcome of an ingest run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub run_id: String,
    pub metric: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub series: usize,
    pub segments: usize,
    pub inserted: usize,
    /// The vector index could not be reached; nothing was stored
    pub index_unavailable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_error: Option<String>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub demo: bool,
}

/// Outcome of an analyze run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub metric: String,
    pub labels: Labels,
    pub env: EnvInfo,
    pub context: Vec<RehydratedMatch>,
    /// The vector index could not be reached; context is empty
    pub context_unavailable: bool,
    pub result: AnalysisResult,
    pub recent_points: Vec<Point>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub demo: bool,
}

/// Active targets and metric names
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetsReport {
    pub targets: Vec<Target>,
    pub metrics: Vec<String>,
}

/// End-to-end ingest and analysis over one backend and one index
pub struct Pipeline {
    fetcher: RangeFetcher,
    segmenter: Segmenter,
    encoder: VectorEncoder,
    index: Arc<dyn VectorIndex>,
    retriever: ContextRetriever,
    analyst: Analyst,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        index: Arc<dyn VectorIndex>,
        analyst: Analyst,
        fetch: FetchConfig,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher: RangeFetcher::new(backend, fetch),
            segmenter: Segmenter::new(config.segment),
            encoder: VectorEncoder::new(config.encoder.clone()),
            retriever: ContextRetriever::new(index.clone(), config.context.clone()),
            index,
            analyst,
            config,
        }
    }

    /// Build the production pipeline from configuration
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        let backend: Arc<dyn MetricsBackend> =
            Arc::new(PrometheusClient::new(config.prometheus_config())?);

        let dim = config.pipeline.vector_dim;
        let index: Arc<dyn VectorIndex> = match config.index.backend.as_str() {
            "memory" => Arc::new(MemoryIndex::new(dim)),
            "sqlite" => Arc::new(SqliteIndex::open(&config.index.resolved_path(), dim)?),
            "milvus" => Arc::new(MilvusIndex::new(config.milvus_config())?),
            other => {
                return Err(PipelineError::Config(format!(
                    "unknown index backend {:?} (expected memory, sqlite or milvus)",
                    other
                )))
            }
        };

        let generator: Option<Arc<dyn Generator>> = if config.analysis.enabled {
            Some(Arc::new(OllamaGenerator::new(config.ollama_config())?))
        } else {
            None
        };
        let analyst = Analyst::new(
            generator,
            FallbackEstimator::new(config.analysis.fallback_tail),
        );

        tracing::debug!(
            prometheus = %config.prometheus.url,
            index = %index.name(),
            dim,
            generative = config.analysis.enabled,
            "Pipeline configured"
        );

        Ok(Self::new(
            backend,
            index,
            analyst,
            config.fetch_config(),
            PipelineConfig::from_config(config),
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &RangeFetcher {
        &self.fetcher
    }

    pub fn encoder(&self) -> &VectorEncoder {
        &self.encoder
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.retriever
    }

    fn step<'a>(&'a self, step: Option<&'a str>) -> &'a str {
        step.unwrap_or(&self.config.default_step)
    }

    /// Index the last `ingest_days` of `metric`
    pub async fn ingest(
        &self,
        metric: &str,
        step: Option<&str>,
        cancel: &CancellationToken,
    ) -> PipelineResult<IngestReport> {
        let end_ts = now();
        let start_ts = end_ts - self.config.ingest_days * 86_400;
        self.ingest_range(metric, start_ts, end_ts, self.step(step), cancel)
            .await
    }

    /// Fetch, segment, encode and insert `metric` over `[start_ts, end_ts]`
    pub async fn ingest_range(
        &self,
        metric: &str,
        start_ts: i64,
        end_ts: i64,
        step: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<IngestReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("ingest", run_id = %run_id, metric = %metric);
        self.run_ingest(run_id.clone(), metric, start_ts, end_ts, step, cancel)
            .instrument(span)
            .await
    }

    async fn run_ingest(
        &self,
        run_id: String,
        metric: &str,
        start_ts: i64,
        end_ts: i64,
        step: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<IngestReport> {
        let outcome = self
            .fetcher
            .fetch_range_with(metric, start_ts, end_ts, step, cancel)
            .await?;
        let series = to_series(&outcome.result)?;

        let mut records = Vec::new();
        for s in &series {
            for segment in self.segmenter.segment(&s.points) {
                records.push(SegmentRecord {
                    metric_name: metric.to_string(),
                    start_ts: segment.start_ts(),
                    end_ts: segment.end_ts(),
                    vector: self.encoder.encode(&segment.points),
                });
            }
        }

        let mut report = IngestReport {
            run_id,
            metric: metric.to_string(),
            start_ts,
            end_ts,
            series: series.len(),
            segments: records.len(),
            failed_chunks: outcome.failed_chunks,
            ..IngestReport::default()
        };
        self.store(records, &mut report).await?;

        tracing::info!(
            series = report.series,
            segments = report.segments,
            inserted = report.inserted,
            failed_chunks = report.failed_chunks.len(),
            "Ingest finished"
        );
        Ok(report)
    }

    /// Index synthetic demo segments for `metric`
    pub async fn ingest_demo(&self, metric: &str) -> PipelineResult<IngestReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("ingest_demo", run_id = %run_id, metric = %metric);
        self.run_ingest_demo(run_id.clone(), metric).instrument(span).await
    }

    async fn run_ingest_demo(&self, run_id: String, metric: &str) -> PipelineResult<IngestReport> {
        let end_ts = now();
        let segments = demo_segments(end_ts);
        let records: Vec<SegmentRecord> = segments
            .iter()
            .map(|segment| SegmentRecord {
                metric_name: metric.to_string(),
                start_ts: segment.start_ts(),
                end_ts: segment.end_ts(),
                vector: self.encoder.encode(&segment.points),
            })
            .collect();

        let mut report = IngestReport {
            run_id,
            metric: metric.to_string(),
            start_ts: segments.last().map(|s| s.start_ts()).unwrap_or(end_ts),
            end_ts,
            segments: records.len(),
            demo: true,
            ..IngestReport::default()
        };
        self.store(records, &mut report).await?;

        tracing::info!(inserted = report.inserted, "Demo ingest finished");
        Ok(report)
    }

    /// Insert records, recording an unreachable index on the report
    async fn store(&self, records: Vec<SegmentRecord>, report: &mut IngestReport) -> PipelineResult<()> {
        let result = match self.index.ensure_collection().await {
            Ok(()) => self.index.insert(records).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(inserted) => {
                report.inserted = inserted;
                Ok(())
            }
            Err(e) if e.is_unavailable() => {
                tracing::warn!(
                    index = %self.index.name(),
                    error = %e,
                    "Vector index unavailable, nothing inserted"
                );
                report.inserted = 0;
                report.index_unavailable = true;
                report.index_error = Some(e.to_string());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Analyse the last `analyze_hours` of `metric`
    pub async fn analyze(
        &self,
        metric: &str,
        step: Option<&str>,
        cancel: &CancellationToken,
    ) -> PipelineResult<AnalysisReport> {
        let end_ts = now();
        let start_ts = end_ts - self.config.analyze_hours * 3600;
        self.analyze_range(metric, start_ts, end_ts, self.step(step), cancel)
            .await
    }

    /// Analyse the first series `metric` yields over `[start_ts, end_ts]`
    pub async fn analyze_range(
        &self,
        metric: &str,
        start_ts: i64,
        end_ts: i64,
        step: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<AnalysisReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("analyze", run_id = %run_id, metric = %metric);
        self.run_analyze(run_id.clone(), metric, start_ts, end_ts, step, cancel)
            .instrument(span)
            .await
    }

    async fn run_analyze(
        &self,
        run_id: String,
        metric: &str,
        start_ts: i64,
        end_ts: i64,
        step: &str,
        cancel: &CancellationToken,
    ) -> PipelineResult<AnalysisReport> {
        let outcome = self
            .fetcher
            .fetch_range_with(metric, start_ts, end_ts, step, cancel)
            .await?;
        let series = to_series(&outcome.result)?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::NoData {
                metric: metric.to_string(),
            })?;

        let vector = self.encoder.encode(&series.points);
        let (context, context_unavailable) = match self.retriever.retrieve(&vector).await {
            Ok(matches) => (
                self.retriever.rehydrate(matches, &self.fetcher, step).await,
                false,
            ),
            Err(e) if e.is_unavailable() => {
                tracing::warn!(error = %e, "Vector index unavailable, analysing without context");
                (Vec::new(), true)
            }
            Err(e) => return Err(e.into()),
        };

        let env = resolve_env(&series.labels, &self.config.hosts);
        let request = AnalysisRequest {
            metric_name: metric.to_string(),
            recent_points: series.points,
            context: context.iter().map(|m| m.context.clone()).collect(),
            env,
        };
        let result = self.analyst.analyze(&request).await;

        tracing::info!(
            context = context.len(),
            context_unavailable,
            generated = result.is_generated(),
            "Analysis finished"
        );

        Ok(AnalysisReport {
            run_id,
            metric: metric.to_string(),
            labels: series.labels,
            env: request.env,
            context,
            context_unavailable,
            result,
            recent_points: request.recent_points,
            failed_chunks: outcome.failed_chunks,
            demo: false,
        })
    }

    /// Analyse synthetic recent points without touching backend or index
    pub async fn analyze_demo(&self, metric: &str) -> AnalysisReport {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("analyze_demo", run_id = %run_id, metric = %metric);

        let request = AnalysisRequest {
            metric_name: metric.to_string(),
            recent_points: demo_recent_points(now()),
            context: Vec::new(),
            env: EnvInfo::new("demo", "demo-service"),
        };
        let result = self.analyst.analyze(&request).instrument(span).await;

        AnalysisReport {
            run_id,
            metric: metric.to_string(),
            labels: Labels::new(),
            env: request.env,
            context: Vec::new(),
            context_unavailable: false,
            result,
            recent_points: request.recent_points,
            failed_chunks: Vec::new(),
            demo: true,
        }
    }

    /// Active targets and metric names, optionally for one instance
    ///
    /// Without an instance the metric list is a fixed set of common
    /// node-exporter metrics. Backend failures yield empty lists.
    pub async fn targets(&self, instance: Option<&str>) -> TargetsReport {
        let backend = self.fetcher.backend();

        let targets = match instance {
            Some(_) => Vec::new(),
            None => backend.targets().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to fetch targets");
                Vec::new()
            }),
        };

        let metrics = match instance {
            Some(instance) => {
                let matcher = format!("{{instance=\"{}\"}}", escape_label_value(instance));
                backend.metric_names(&matcher).await.unwrap_or_else(|e| {
                    tracing::warn!(instance = %instance, error = %e, "Failed to fetch metric names");
                    Vec::new()
                })
            }
            None => COMMON_METRICS.iter().map(|m| m.to_string()).collect(),
        };

        TargetsReport { targets, metrics }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::testing::{StubBackend, UnavailableIndex};

    const START: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn pipeline(backend: StubBackend, index: Arc<dyn VectorIndex>) -> Pipeline {
        let mut config = PipelineConfig::default();
        config
            .hosts
            .insert("a".to_string(), EnvInfo::new("prod", "orders"));
        Pipeline::new(
            Arc::new(backend),
            index,
            Analyst::statistical(),
            FetchConfig::default(),
            config,
        )
    }

    #[tokio::test]
    async fn test_two_hours_of_minutely_points() {
        let index = Arc::new(MemoryIndex::new(128));
        let p = pipeline(StubBackend::new(&["a"]), index.clone());
        let cancel = CancellationToken::new();

        let report = p
            .ingest_range("stub_metric", START, START + 119 * 60, "60s", &cancel)
            .await
            .unwrap();
        assert_eq!(report.series, 1);
        assert_eq!(report.segments, 2);
        assert_eq!(report.inserted, 2);
        assert!(!report.index_unavailable);
        assert_eq!(index.len().await, 2);

        // Query with the first segment's own points
        let first: Vec<Point> = (0..=60)
            .map(|i| {
                let ts = START + i * 60;
                Point::new(ts, crate::testing::stub_value(0, ts))
            })
            .collect();
        let vector = p.encoder().encode(&first);
        assert_eq!(vector.len(), 128);

        let matches = p.retriever().retrieve(&vector).await.unwrap();
        assert_eq!(matches[0].start_ts, START);
        assert_eq!(matches[0].end_ts, START + 3600);
        assert!(matches[0].distance < 1e-3);
    }

    #[tokio::test]
    async fn test_thirty_days_ingest_is_chunked() {
        let backend = StubBackend::new(&["a"]).failing_at(START + 600_000);
        let p = pipeline(backend, Arc::new(MemoryIndex::new(128)));

        let report = p
            .ingest_range("stub_metric", START, START + 30 * DAY, "60s", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.failed_chunks.len(), 1);
        assert!(report.segments > 500);
        assert_eq!(report.inserted, report.segments);
    }

    #[tokio::test]
    async fn test_unavailable_index_is_reported() {
        let p = pipeline(StubBackend::new(&["a"]), Arc::new(UnavailableIndex));

        let report = p
            .ingest_range("stub_metric", START, START + 119 * 60, "60s", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.segments, 2);
        assert_eq!(report.inserted, 0);
        assert!(report.index_unavailable);
        assert!(report.index_error.is_some());
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let p = pipeline(StubBackend::unreachable(), Arc::new(MemoryIndex::new(128)));

        let err = p
            .ingest_range("stub_metric", START, START + 3600, "60s", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(FetchError::BackendUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_analyze_with_context() {
        let index = Arc::new(MemoryIndex::new(128));
        let p = pipeline(StubBackend::new(&["a", "b"]), index);
        let cancel = CancellationToken::new();

        p.ingest_range("stub_metric", START, START + DAY, "60s", &cancel)
            .await
            .unwrap();
        let report = p
            .analyze_range("stub_metric", START + DAY, START + DAY + 6 * 3600, "60s", &cancel)
            .await
            .unwrap();

        assert_eq!(report.context.len(), 3);
        assert!(!report.context[0].points.is_empty());
        assert!(!report.context_unavailable);
        assert_eq!(report.env, EnvInfo::new("prod", "orders"));
        assert_eq!(report.recent_points.len(), 361);
        assert!(matches!(report.result, AnalysisResult::StatisticalFallback(_)));
    }

    #[tokio::test]
    async fn test_analyze_without_index() {
        let p = pipeline(StubBackend::new(&["a"]), Arc::new(UnavailableIndex));

        let report = p
            .analyze_range("stub_metric", START, START + 3600, "60s", &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.context_unavailable);
        assert!(report.context.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_no_data() {
        let p = pipeline(StubBackend::new(&[]), Arc::new(MemoryIndex::new(128)));

        let err = p
            .analyze_range("stub_metric", START, START + 3600, "60s", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_demo_runs() {
        let index = Arc::new(MemoryIndex::new(128));
        let p = pipeline(StubBackend::unreachable(), index.clone());

        let report = p.ingest_demo("demo_metric").await.unwrap();
        assert!(report.demo);
        assert_eq!(report.inserted, 24);
        assert_eq!(index.len().await, 24);

        let report = p.analyze_demo("demo_metric").await;
        assert!(report.demo);
        assert_eq!(report.recent_points.len(), 60);
        assert_eq!(report.env.env, "demo");
    }

    #[tokio::test]
    async fn test_targets() {
        let p = pipeline(StubBackend::new(&["a"]), Arc::new(MemoryIndex::new(128)));

        let all = p.targets(None).await;
        assert_eq!(all.targets.len(), 1);
        assert_eq!(all.metrics.len(), COMMON_METRICS.len());

        let one = p.targets(Some("a")).await;
        assert!(one.targets.is_empty());
        assert_eq!(one.metrics, vec!["node_load1", "up"]);

        let offline = pipeline(StubBackend::unreachable(), Arc::new(MemoryIndex::new(128)));
        assert!(offline.targets(None).await.targets.is_empty());
        assert!(offline.targets(Some("a")).await.metrics.is_empty());
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
