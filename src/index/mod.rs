//! Segment Vector Index
//!
//! Stores one row per indexed segment and answers L2 nearest-neighbour
//! queries:
//!
//! - **MemoryIndex**: in-process brute force, for tests and demo runs
//! - **SqliteIndex**: local SQLite table with bincode vector blobs
//! - **MilvusIndex**: Milvus RESTful v2 client (IVF_FLAT, L2)
//!
//! # Row layout
//!
//! ```text
//! id (auto) | metric_name | start_ts | end_ts | vector[dim]
//! ```
//!
//! Rows are never updated or deleted once inserted.

mod error;
mod memory;
mod milvus;
mod sqlite;

pub use error::{IndexError, IndexResult};
pub use memory::MemoryIndex;
pub use milvus::{MilvusConfig, MilvusIndex};
pub use sqlite::SqliteIndex;

use crate::encode::FeatureVector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A segment ready for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub metric_name: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub vector: FeatureVector,
}

/// A stored segment with its index-assigned id
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSegment {
    pub id: i64,
    pub record: SegmentRecord,
}

/// One nearest-neighbour result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub metric_name: String,
    pub start_ts: i64,
    pub end_ts: i64,
    /// L2 distance to the query vector
    pub distance: f32,
}

/// Storage and similarity search for segment vectors
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name used in logs and errors
    fn name(&self) -> &str;

    /// Vector dimension accepted by this index
    fn dim(&self) -> usize;

    /// Create the collection if it does not exist; safe to call repeatedly
    async fn ensure_collection(&self) -> IndexResult<()>;

    /// Insert rows, returning how many were stored
    async fn insert(&self, records: Vec<SegmentRecord>) -> IndexResult<usize>;

    /// Up to `top_k` nearest rows to `vector`, closest first
    async fn search(&self, vector: &FeatureVector, top_k: usize) -> IndexResult<Vec<SearchHit>>;
}

pub(crate) fn check_dim(expected: usize, vector: &FeatureVector) -> IndexResult<()> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Brute-force ranking shared by the local backends
///
/// Ties are broken by id so results are stable across runs.
pub(crate) fn rank_nearest<I>(query: &FeatureVector, rows: I, top_k: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = IndexedSegment>,
{
    let mut hits: Vec<SearchHit> = rows
        .into_iter()
        .filter_map(|row| {
            let distance = query.l2_distance(&row.record.vector)?;
            Some(SearchHit {
                id: row.id,
                metric_name: row.record.metric_name,
                start_ts: row.record.start_ts,
                end_ts: row.record.end_ts,
                distance,
            })
        })
        .collect();

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, vector: Vec<f32>) -> IndexedSegment {
        IndexedSegment {
            id,
            record: SegmentRecord {
                metric_name: "up".to_string(),
                start_ts: id * 100,
                end_ts: id * 100 + 60,
                vector: FeatureVector::from(vector),
            },
        }
    }

    #[test]
    fn test_rank_nearest_orders_and_caps() {
        let query = FeatureVector::from(vec![0.0, 0.0]);
        let rows = vec![
            row(1, vec![3.0, 4.0]),
            row(2, vec![1.0, 0.0]),
            row(3, vec![0.0, 2.0]),
            row(4, vec![0.0, 0.0]),
        ];

        let hits = rank_nearest(&query, rows, 3);
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![4, 2, 3]);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_rank_nearest_breaks_ties_by_id() {
        let query = FeatureVector::from(vec![0.0]);
        let rows = vec![row(9, vec![1.0]), row(2, vec![-1.0])];
        let ids: Vec<i64> = rank_nearest(&query, rows, 5).iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[test]
    fn test_check_dim() {
        assert!(check_dim(2, &FeatureVector::zeros(2)).is_ok());
        assert!(matches!(
            check_dim(2, &FeatureVector::zeros(3)),
            Err(IndexError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
