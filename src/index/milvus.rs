//! Milvus RESTful v2 client
//!
//! Uses:
//! - `POST /v2/vectordb/collections/has`
//! - `POST /v2/vectordb/collections/create`
//! - `POST /v2/vectordb/entities/insert`
//! - `POST /v2/vectordb/entities/search`
//!
//! Milvus reports squared L2 distances; hits are converted to plain
//! Euclidean distance so every backend ranks on the same scale.

use crate::encode::FeatureVector;
use crate::index::{check_dim, IndexError, IndexResult, SearchHit, SegmentRecord, VectorIndex};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Configuration for the Milvus client
#[derive(Debug, Clone)]
pub struct MilvusConfig {
    /// Base URL (e.g., "http://localhost:19530")
    pub base_url: String,
    pub collection: String,
    /// Bearer token (`user:password` or API key); empty for none
    pub token: String,
    pub dim: usize,
    pub timeout_secs: u64,
    /// IVF cluster count used when creating the collection index
    pub nlist: u32,
    /// Clusters probed per search
    pub nprobe: u32,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:19530".to_string(),
            collection: "metrics_segments".to_string(),
            token: String::new(),
            dim: 128,
            timeout_secs: 30,
            nlist: 1024,
            nprobe: 16,
        }
    }
}

/// Milvus-backed vector index
pub struct MilvusIndex {
    client: Client,
    config: MilvusConfig,
    ready: OnceCell<()>,
}

impl MilvusIndex {
    pub fn new(config: MilvusConfig) -> IndexResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("precedent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            ready: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &MilvusConfig {
        &self.config
    }

    /// POST a request body and unwrap the `{code, message, data}` envelope
    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> IndexResult<T> {
        let url = format!(
            "{}/v2/vectordb/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        );

        let mut request = self.client.post(&url).json(body);
        if !self.config.token.is_empty() {
            request = request.bearer_auth(&self.config.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IndexError::from_transport(&self.config.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                code: status.as_u16() as i64,
                message: text,
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        if envelope.code != 0 {
            return Err(IndexError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        envelope.data.ok_or_else(|| IndexError::Api {
            code: envelope.code,
            message: "response has no data".to_string(),
        })
    }

    async fn has_collection(&self) -> IndexResult<bool> {
        let body = json!({ "collectionName": self.config.collection });
        let data: HasData = self.post("collections/has", &body).await?;
        Ok(data.has)
    }

    async fn create_collection(&self) -> IndexResult<()> {
        let body = json!({
            "collectionName": self.config.collection,
            "schema": {
                "autoId": true,
                "enabledDynamicField": false,
                "fields": [
                    {"fieldName": "id", "dataType": "Int64", "isPrimary": true},
                    {"fieldName": "metric_name", "dataType": "VarChar",
                     "elementTypeParams": {"max_length": 256}},
                    {"fieldName": "start_ts", "dataType": "Int64"},
                    {"fieldName": "end_ts", "dataType": "Int64"},
                    {"fieldName": "vector", "dataType": "FloatVector",
                     "elementTypeParams": {"dim": self.config.dim}}
                ]
            },
            "indexParams": [{
                "fieldName": "vector",
                "indexName": "vector_ivf",
                "metricType": "L2",
                "indexType": "IVF_FLAT",
                "params": {"nlist": self.config.nlist}
            }]
        });

        let _: Value = self.post("collections/create", &body).await?;
        tracing::info!(
            collection = %self.config.collection,
            dim = self.config.dim,
            "Created Milvus collection"
        );
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MilvusIndex {
    fn name(&self) -> &str {
        "milvus"
    }

    fn dim(&self) -> usize {
        self.config.dim
    }

    async fn ensure_collection(&self) -> IndexResult<()> {
        self.ready
            .get_or_try_init(|| async {
                if !self.has_collection().await? {
                    self.create_collection().await?;
                }
                Ok::<(), IndexError>(())
            })
            .await?;
        Ok(())
    }

    async fn insert(&self, records: Vec<SegmentRecord>) -> IndexResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in &records {
            check_dim(self.config.dim, &record.vector)?;
        }
        self.ensure_collection().await?;

        let body = json!({
            "collectionName": self.config.collection,
            "data": records,
        });
        let data: InsertData = self.post("entities/insert", &body).await?;
        Ok(data.insert_count)
    }

    async fn search(&self, vector: &FeatureVector, top_k: usize) -> IndexResult<Vec<SearchHit>> {
        check_dim(self.config.dim, vector)?;
        self.ensure_collection().await?;

        let body = json!({
            "collectionName": self.config.collection,
            "data": [vector],
            "annsField": "vector",
            "limit": top_k,
            "searchParams": {"metricType": "L2", "params": {"nprobe": self.config.nprobe}},
            "outputFields": ["metric_name", "start_ts", "end_ts"],
        });
        let rows: Vec<SearchRow> = self.post("entities/search", &body).await?;

        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|row| SearchHit {
                id: row.id(),
                metric_name: row.metric_name,
                start_ts: row.start_ts,
                end_ts: row.end_ts,
                distance: row.distance.max(0.0).sqrt(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }
}

// ============================================
// Response DTOs
// ============================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct HasData {
    has: bool,
}

#[derive(Debug, Deserialize)]
struct InsertData {
    #[serde(rename = "insertCount")]
    insert_count: usize,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    /// Int64 primary keys may arrive as numbers or strings
    #[serde(default)]
    id: Value,
    distance: f32,
    #[serde(default)]
    metric_name: String,
    #[serde(default)]
    start_ts: i64,
    #[serde(default)]
    end_ts: i64,
}

impl SearchRow {
    fn id(&self) -> i64 {
        match &self.id {
            Value::Number(n) => n.as_i64().unwrap_or_default(),
            Value::String(s) => s.parse().unwrap_or_default(),
            _ => 0,
        }
    }
}
