//! SQLite-backed vector index
//!
//! Keeps segment rows in a single table with the vector stored as a bincode
//! blob. Search is a full scan with exact L2 distance, which is fine for the
//! tens of thousands of segments a single host accumulates.

use crate::encode::FeatureVector;
use crate::index::{
    check_dim, rank_nearest, IndexError, IndexResult, IndexedSegment, SearchHit, SegmentRecord,
    VectorIndex,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Local file index
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    dim: usize,
}

impl SqliteIndex {
    /// Open or create the index database at `path`
    pub fn open(path: &Path, dim: usize) -> IndexResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        let index = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
            dim,
        };
        index.create_table()?;

        tracing::debug!(path = ?index.path, dim, "Opened SQLite segment index");
        Ok(index)
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        lock_conn(&self.conn)
    }

    fn create_table(&self) -> IndexResult<()> {
        create_table(&*self.lock()?)
    }

    /// Number of stored rows
    pub fn count(&self) -> IndexResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Run `f` against the connection on the blocking thread pool
    async fn with_conn_blocking<F, T>(&self, f: F) -> IndexResult<T>
    where
        F: FnOnce(&mut Connection) -> IndexResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock_conn(&conn)?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| IndexError::Task(e.to_string()))?
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> IndexResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| IndexError::Lock(format!("Failed to acquire index lock: {}", e)))
}

fn create_table(conn: &Connection) -> IndexResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            metric_name TEXT NOT NULL,
            start_ts INTEGER NOT NULL,
            end_ts INTEGER NOT NULL,
            vector BLOB NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_segments_metric ON segments(metric_name)",
        [],
    )?;
    Ok(())
}

fn insert_rows(conn: &mut Connection, records: &[SegmentRecord]) -> IndexResult<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO segments (metric_name, start_ts, end_ts, vector)
             VALUES (?, ?, ?, ?)",
        )?;
        for record in records {
            let blob = bincode::serialize(record.vector.as_slice())?;
            stmt.execute(params![
                record.metric_name,
                record.start_ts,
                record.end_ts,
                blob
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

fn load_rows(conn: &Connection) -> IndexResult<Vec<IndexedSegment>> {
    let mut stmt =
        conn.prepare_cached("SELECT id, metric_name, start_ts, end_ts, vector FROM segments")?;

    let raw_rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Vec<u8>>(4)?,
        ))
    })?;

    let mut rows = Vec::new();
    for raw in raw_rows {
        let (id, metric_name, start_ts, end_ts, blob) = raw?;
        let values: Vec<f32> = bincode::deserialize(&blob)?;
        rows.push(IndexedSegment {
            id,
            record: SegmentRecord {
                metric_name,
                start_ts,
                end_ts,
                vector: FeatureVector(values),
            },
        });
    }
    Ok(rows)
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn ensure_collection(&self) -> IndexResult<()> {
        self.with_conn_blocking(|conn| create_table(conn)).await
    }

    async fn insert(&self, records: Vec<SegmentRecord>) -> IndexResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in &records {
            check_dim(self.dim, &record.vector)?;
        }

        self.with_conn_blocking(move |conn| insert_rows(conn, &records))
            .await
    }

    async fn search(&self, vector: &FeatureVector, top_k: usize) -> IndexResult<Vec<SearchHit>> {
        check_dim(self.dim, vector)?;
        let rows = self.with_conn_blocking(|conn| load_rows(conn)).await?;
        Ok(rank_nearest(vector, rows, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(metric: &str, start_ts: i64, vector: Vec<f32>) -> SegmentRecord {
        SegmentRecord {
            metric_name: metric.to_string(),
            start_ts,
            end_ts: start_ts + 3540,
            vector: FeatureVector::from(vector),
        }
    }

    #[tokio::test]
    async fn test_insert_and_search() {
        let dir = tempdir().unwrap();
        let index = SqliteIndex::open(&dir.path().join("segments.db"), 3).unwrap();
        index.ensure_collection().await.unwrap();

        let inserted = index
            .insert(vec![
                record("up", 0, vec![0.0, 0.0, 0.0]),
                record("up", 3600, vec![1.0, 1.0, 1.0]),
                record("node_load1", 7200, vec![0.1, 0.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(index.count().unwrap(), 3);

        let hits = index
            .search(&FeatureVector::from(vec![0.0, 0.0, 0.0]), 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].start_ts, 0);
        assert_eq!(hits[1].metric_name, "node_load1");
        assert!((hits[1].distance - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("segments.db");

        {
            let index = SqliteIndex::open(&path, 2).unwrap();
            index.insert(vec![record("up", 60, vec![2.0, 2.0])]).await.unwrap();
        }

        let index = SqliteIndex::open(&path, 2).unwrap();
        let hits = index.search(&FeatureVector::from(vec![2.0, 2.0]), 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].start_ts, 60);
        assert_eq!(hits[0].end_ts, 3600);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_inserts_and_searches() {
        let dir = tempdir().unwrap();
        let index = Arc::new(SqliteIndex::open(&dir.path().join("segments.db"), 2).unwrap());

        let mut tasks = Vec::new();
        for i in 0..8i64 {
            let index = Arc::clone(&index);
            tasks.push(tokio::spawn(async move {
                let batch = (0..25)
                    .map(|j| record("up", (i * 25 + j) * 3600, vec![i as f32, j as f32]))
                    .collect();
                index.insert(batch).await.unwrap();
                index
                    .search(&FeatureVector::from(vec![0.0, 0.0]), 5)
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            let hits = task.await.unwrap();
            assert!(!hits.is_empty());
        }

        assert_eq!(index.count().unwrap(), 200);
        let hits = index.search(&FeatureVector::from(vec![0.0, 0.0]), 1).await.unwrap();
        assert_eq!(hits[0].start_ts, 0);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let index = SqliteIndex::open(&dir.path().join("segments.db"), 2).unwrap();

        let err = index.insert(vec![record("up", 0, vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 2, actual: 1 }));
        assert_eq!(index.count().unwrap(), 0);
    }
}
