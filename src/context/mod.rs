//! Similarity Context
//!
//! Turns a query segment's vector into the most similar historical segments.
//! Retrieval answers with time ranges only; [`ContextRetriever::rehydrate`]
//! goes back to the metrics backend for the points behind each range.

use crate::encode::FeatureVector;
use crate::fetch::RangeFetcher;
use crate::index::{IndexResult, VectorIndex};
use crate::series::{to_series, Point};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Number of neighbours returned by [`ContextRetriever::retrieve`]
    pub top_k: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// A historical segment similar to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMatch {
    pub metric_name: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub distance: f32,
}

/// A match together with the points re-fetched for its range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RehydratedMatch {
    #[serde(flatten)]
    pub context: ContextMatch,
    pub points: Vec<Point>,
}

/// Nearest-neighbour lookup over indexed segments
pub struct ContextRetriever {
    index: Arc<dyn VectorIndex>,
    config: ContextConfig,
}

impl ContextRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, config: ContextConfig) -> Self {
        Self { index, config }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Retrieve with the configured `top_k`
    pub async fn retrieve(&self, vector: &FeatureVector) -> IndexResult<Vec<ContextMatch>> {
        self.retrieve_context(vector, self.config.top_k).await
    }

    /// Up to `top_k` indexed segments closest to `vector`, ascending by distance
    ///
    /// An unreachable index is an error; an empty index is `Ok(vec![])`.
    pub async fn retrieve_context(
        &self,
        vector: &FeatureVector,
        top_k: usize,
    ) -> IndexResult<Vec<ContextMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.index.search(vector, top_k).await?;
        let mut matches: Vec<ContextMatch> = hits
            .into_iter()
            .map(|hit| ContextMatch {
                metric_name: hit.metric_name,
                start_ts: hit.start_ts,
                end_ts: hit.end_ts,
                distance: hit.distance,
            })
            .collect();

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(top_k);

        tracing::debug!(
            index = %self.index.name(),
            top_k,
            found = matches.len(),
            "Retrieved similar segments"
        );
        Ok(matches)
    }

    /// Re-fetch the points behind each match
    ///
    /// Matches whose range fails to fetch or returns no data are dropped;
    /// survivors keep their original order.
    pub async fn rehydrate(
        &self,
        matches: Vec<ContextMatch>,
        fetcher: &RangeFetcher,
        step: &str,
    ) -> Vec<RehydratedMatch> {
        let fetches = matches.into_iter().map(move |context| async move {
            let result = fetcher
                .fetch_range(&context.metric_name, context.start_ts, context.end_ts, step)
                .await;

            let points = match result {
                Ok(raw) => match to_series(&raw) {
                    Ok(series) => series.into_iter().find(|s| !s.is_empty()).map(|s| s.points),
                    Err(e) => {
                        tracing::warn!(
                            metric = %context.metric_name,
                            start_ts = context.start_ts,
                            end_ts = context.end_ts,
                            error = %e,
                            "Dropping context match with malformed data"
                        );
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        metric = %context.metric_name,
                        start_ts = context.start_ts,
                        end_ts = context.end_ts,
                        error = %e,
                        "Dropping context match that could not be fetched"
                    );
                    None
                }
            };

            match points {
                Some(points) => Some(RehydratedMatch { context, points }),
                None => {
                    tracing::debug!(metric = %context.metric_name, "Context match has no data");
                    None
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use crate::index::{IndexError, MemoryIndex, SegmentRecord};
    use crate::testing::{StubBackend, UnavailableIndex};

    fn record(start_ts: i64, first: f32) -> SegmentRecord {
        SegmentRecord {
            metric_name: "stub_metric".to_string(),
            start_ts,
            end_ts: start_ts + 300,
            vector: FeatureVector::from(vec![first, 0.0]),
        }
    }

    async fn populated() -> ContextRetriever {
        let index = Arc::new(MemoryIndex::new(2));
        index
            .insert(vec![
                record(0, 5.0),
                record(1000, 1.0),
                record(2000, 3.0),
                record(3000, 0.5),
                record(4000, 4.0),
            ])
            .await
            .unwrap();
        ContextRetriever::new(index, ContextConfig::default())
    }

    #[tokio::test]
    async fn test_results_ordered_and_capped() {
        let retriever = populated().await;
        let query = FeatureVector::from(vec![0.0, 0.0]);

        let matches = retriever.retrieve(&query).await.unwrap();
        let starts: Vec<i64> = matches.iter().map(|m| m.start_ts).collect();
        assert_eq!(starts, vec![3000, 1000, 2000]);
        assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));

        let all = retriever.retrieve_context(&query, 10).await.unwrap();
        assert_eq!(all.len(), 5);

        assert!(retriever.retrieve_context(&query, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_is_not_an_error() {
        let retriever = ContextRetriever::new(Arc::new(MemoryIndex::new(2)), ContextConfig::default());
        let matches = retriever.retrieve(&FeatureVector::zeros(2)).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_index_propagates() {
        let retriever = ContextRetriever::new(Arc::new(UnavailableIndex), ContextConfig::default());
        let err = retriever.retrieve(&FeatureVector::zeros(128)).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_rehydrate_drops_empty_and_failed_ranges() {
        let retriever = populated().await;
        let fetcher = RangeFetcher::new(Arc::new(StubBackend::new(&["a"])), FetchConfig::default());

        let good = ContextMatch {
            metric_name: "stub_metric".to_string(),
            start_ts: 600,
            end_ts: 900,
            distance: 0.5,
        };
        let inverted = ContextMatch {
            metric_name: "stub_metric".to_string(),
            start_ts: 900,
            end_ts: 600,
            distance: 0.7,
        };

        let rehydrated = retriever
            .rehydrate(vec![good.clone(), inverted], &fetcher, "60s")
            .await;
        assert_eq!(rehydrated.len(), 1);
        assert_eq!(rehydrated[0].context, good);
        assert_eq!(rehydrated[0].points.len(), 6);

        let empty = RangeFetcher::new(Arc::new(StubBackend::new(&[])), FetchConfig::default());
        assert!(retriever.rehydrate(vec![good], &empty, "60s").await.is_empty());
    }

    #[test]
    fn test_rehydrated_match_serializes_flat() {
        let m = RehydratedMatch {
            context: ContextMatch {
                metric_name: "up".to_string(),
                start_ts: 0,
                end_ts: 60,
                distance: 0.0,
            },
            points: vec![Point::new(0, 1.0)],
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["metric_name"], "up");
        assert_eq!(json["points"][0]["timestamp"], 0);
    }
}
