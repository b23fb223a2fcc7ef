//! In-memory vector index

use crate::encode::FeatureVector;
use crate::index::{check_dim, rank_nearest, IndexResult, IndexedSegment, SearchHit, SegmentRecord, VectorIndex};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// Brute-force index held in process memory
pub struct MemoryIndex {
    dim: usize,
    rows: RwLock<Vec<IndexedSegment>>,
    next_id: AtomicI64,
}

impl MemoryIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn ensure_collection(&self) -> IndexResult<()> {
        Ok(())
    }

    async fn insert(&self, records: Vec<SegmentRecord>) -> IndexResult<usize> {
        for record in &records {
            check_dim(self.dim, &record.vector)?;
        }

        let count = records.len();
        let mut rows = self.rows.write().await;
        for record in records {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            rows.push(IndexedSegment { id, record });
        }
        Ok(count)
    }

    async fn search(&self, vector: &FeatureVector, top_k: usize) -> IndexResult<Vec<SearchHit>> {
        check_dim(self.dim, vector)?;
        let rows = self.rows.read().await;
        Ok(rank_nearest(vector, rows.iter().cloned(), top_k))
    }
}
