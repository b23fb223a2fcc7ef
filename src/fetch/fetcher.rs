//! Range Fetcher
//!
//! Retrieves long time ranges from a metrics backend. Ranges that would
//! exceed the backend's per-request point budget are split into step-aligned
//! chunks, fetched with bounded concurrency, and merged per series.
//!
//! # Failure policy
//!
//! - A single (non-chunked) request that fails propagates its error.
//! - A failed chunk is logged and skipped; the merged result still reports
//!   success and the outcome lists which chunk ranges are missing.

use crate::fetch::backend::MetricsBackend;
use crate::fetch::error::{FetchError, FetchResult};
use crate::fetch::merge::ChunkMerger;
use crate::fetch::raw::RawResult;
use crate::fetch::step::parse_step;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Chunking policy
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Largest number of points requested in one query (Prometheus caps at 11,000)
    pub max_points_per_request: i64,
    /// Chunk requests in flight at once
    pub chunk_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_points_per_request: 10_000,
            chunk_concurrency: 4,
        }
    }
}

/// One sub-range of a chunked fetch, inclusive at both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    pub start: i64,
    pub end: i64,
}

/// A chunk that was skipped because its request failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    pub start: i64,
    pub end: i64,
    pub error: String,
}

/// Result of a fetch together with its chunking details
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub result: RawResult,
    /// Number of backend requests issued
    pub chunks: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl FetchOutcome {
    /// True when at least one chunk was skipped
    pub fn is_partial(&self) -> bool {
        !self.failed_chunks.is_empty()
    }
}

/// Split `[start, end)` into consecutive step-aligned chunks
///
/// Each chunk spans `max_points * step` seconds except possibly the last.
/// Adjacent chunks share their boundary timestamp.
pub fn plan_chunks(start: i64, end: i64, step_seconds: i64, max_points: i64) -> Vec<ChunkRange> {
    let step_seconds = step_seconds.max(1);
    let width = ((max_points.max(1) * step_seconds) / step_seconds) * step_seconds;

    let mut chunks = Vec::new();
    let mut curr = start;
    while curr < end {
        let next = (curr + width).min(end);
        chunks.push(ChunkRange {
            start: curr,
            end: next,
        });
        curr = next;
    }
    chunks
}

/// Fetches metric history, paginating long ranges
pub struct RangeFetcher {
    backend: Arc<dyn MetricsBackend>,
    config: FetchConfig,
}

impl RangeFetcher {
    pub fn new(backend: Arc<dyn MetricsBackend>, config: FetchConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn MetricsBackend> {
        &self.backend
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `query` over `[start_ts, end_ts]` at resolution `step`
    pub async fn fetch_range(
        &self,
        query: &str,
        start_ts: i64,
        end_ts: i64,
        step: &str,
    ) -> FetchResult<RawResult> {
        let outcome = self
            .fetch_range_with(query, start_ts, end_ts, step, &CancellationToken::new())
            .await?;
        Ok(outcome.result)
    }

    /// Fetch with chunk details, checking `cancel` between chunks
    pub async fn fetch_range_with(
        &self,
        query: &str,
        start_ts: i64,
        end_ts: i64,
        step: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        if end_ts < start_ts {
            return Err(FetchError::InvalidRange {
                start: start_ts,
                end: end_ts,
            });
        }

        let step_seconds = parse_step(step)?;
        let max_points = self.config.max_points_per_request.max(1);
        let estimated_points = (end_ts - start_ts) as f64 / step_seconds as f64;

        if estimated_points <= max_points as f64 {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            let result = self
                .backend
                .query_range(query, start_ts, end_ts, step_seconds)
                .await?;
            return Ok(FetchOutcome {
                result,
                chunks: 1,
                failed_chunks: Vec::new(),
            });
        }

        let ranges = plan_chunks(start_ts, end_ts, step_seconds, max_points);
        tracing::debug!(
            query = %query,
            chunks = ranges.len(),
            step_seconds,
            estimated_points = estimated_points as i64,
            "Fetching range in chunks"
        );

        let backend = &self.backend;
        let mut responses = stream::iter(ranges.iter().copied())
            .map(move |range| async move {
                let result = backend
                    .query_range(query, range.start, range.end, step_seconds)
                    .await;
                (range, result)
            })
            .buffered(self.config.chunk_concurrency.max(1));

        let mut merger = ChunkMerger::new();
        let mut failed_chunks = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(query = %query, "Chunked fetch cancelled");
                    return Err(FetchError::Cancelled);
                }
                next = responses.next() => next,
            };

            let Some((range, result)) = next else {
                break;
            };

            match result {
                Ok(raw) => merger.absorb(raw),
                Err(e) => {
                    tracing::warn!(
                        query = %query,
                        backend = %self.backend.name(),
                        chunk_start = range.start,
                        chunk_end = range.end,
                        error = %e,
                        "Chunk fetch failed, continuing with remaining chunks"
                    );
                    failed_chunks.push(ChunkFailure {
                        start: range.start,
                        end: range.end,
                        error: e.to_string(),
                    });
                }
            }
        }

        if failed_chunks.len() == ranges.len() {
            tracing::error!(
                query = %query,
                chunks = ranges.len(),
                "Every chunk failed; returning an empty result"
            );
        }

        Ok(FetchOutcome {
            result: merger.finish(),
            chunks: ranges.len(),
            failed_chunks,
        })
    }
}
