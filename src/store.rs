//! Vector index access.
//!
//! [`VectorStore`] is the single abstraction the pipeline, backfill, and
//! retriever depend on; [`PineconeStore`] implements it over the
//! Pinecone data-plane REST API, scoped to one namespace.
//!
//! Fetch responses have shipped in more than one shape across gateway
//! versions. All shape-sniffing is isolated in
//! [`normalize_fetch_vectors`]; the rest of the crate only ever sees
//! [`FetchedVector`].

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::StoreConfig;
use crate::metadata::ChunkMetadata;

/// The unit written to the vector index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// One record as returned by a fetch. Values and metadata are each
/// optional — the gateway omits what the request did not include.
#[derive(Debug, Clone, Default)]
pub struct FetchedVector {
    pub values: Option<Vec<f32>>,
    pub metadata: Option<Value>,
}

/// One ranked result of a similarity query.
#[derive(Debug, Clone)]
pub struct RetrievedMatch {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Operations the rest of the system needs from the vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Write a batch of records. Upserts are idempotent per ID.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Delete every vector whose metadata `source` equals the given
    /// value. Used when a document's content changed and its old
    /// (differently-prefixed) IDs are unknown.
    async fn delete_by_source(&self, source: &str) -> Result<()>;

    /// Fetch records by ID. Missing IDs are simply absent from the map.
    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, FetchedVector>>;

    /// Metadata-only update. Returns `Ok(false)` when the store endpoint
    /// does not support it, letting callers fall back to a full upsert.
    async fn update_metadata(&self, id: &str, metadata: &Map<String, Value>) -> Result<bool>;

    /// Top-k similarity query with metadata included.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedMatch>>;
}

/// Pinecone REST implementation of [`VectorStore`].
///
/// Requires the `PINECONE_API_KEY` environment variable at construction
/// time. All calls target the configured index host and namespace.
pub struct PineconeStore {
    host: String,
    namespace: String,
    api_key: String,
    client: reqwest::Client,
}

impl PineconeStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            host: config.index_host.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            api_key,
            client,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Vector store request failed: {}", path))
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let vectors: Vec<Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "values": r.values,
                    "metadata": r.metadata,
                })
            })
            .collect();

        let body = serde_json::json!({
            "vectors": vectors,
            "namespace": self.namespace,
        });

        let response = self.post("/vectors/upsert", &body).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Upsert failed ({}): {}", status, text);
        }
        Ok(())
    }

    async fn delete_by_source(&self, source: &str) -> Result<()> {
        let body = serde_json::json!({
            "filter": { "source": { "$eq": source } },
            "namespace": self.namespace,
        });

        let response = self.post("/vectors/delete", &body).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Delete by source failed ({}): {}", status, text);
        }
        Ok(())
    }

    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, FetchedVector>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        query.push(("namespace", self.namespace.as_str()));

        let response = self
            .client
            .get(format!("{}/vectors/fetch", self.host))
            .header("Api-Key", &self.api_key)
            .query(&query)
            .send()
            .await
            .context("Vector store request failed: /vectors/fetch")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Fetch failed ({}): {}", status, text);
        }

        let json: Value = response.json().await?;
        normalize_fetch_vectors(&json)
    }

    async fn update_metadata(&self, id: &str, metadata: &Map<String, Value>) -> Result<bool> {
        let body = serde_json::json!({
            "id": id,
            "setMetadata": metadata,
            "namespace": self.namespace,
        });

        let response = self.post("/vectors/update", &body).await?;
        let status = response.status();

        // Older gateways do not expose the update endpoint at all.
        if matches!(status.as_u16(), 404 | 405 | 501) {
            return Ok(false);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Metadata update failed ({}): {}", status, text);
        }
        Ok(true)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedMatch>> {
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "namespace": self.namespace,
            "includeMetadata": true,
            "includeValues": false,
        });

        let response = self.post("/query", &body).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Query failed ({}): {}", status, text);
        }

        let json: Value = response.json().await?;
        let matches = json
            .get("matches")
            .and_then(|m| m.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid query response: missing matches"))?;

        Ok(matches
            .iter()
            .map(|m| RetrievedMatch {
                id: m.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                score: m.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
                metadata: m
                    .get("metadata")
                    .map(ChunkMetadata::from_store_value)
                    .unwrap_or_default(),
            })
            .collect())
    }
}

/// Normalize a fetch response into a uniform `id → FetchedVector` map.
///
/// Accepted shapes:
/// - `{"vectors": {"<id>": {"id", "values", "metadata"}, ...}}`
/// - `{"records": {...}}` (newer gateways) or `{"records": [...]}` with
///   per-record `id` fields
/// - records whose payload is nested one level under a `"vector"` key
///
/// Anything else is a hard error — guessing here would corrupt the
/// backfill write path.
pub fn normalize_fetch_vectors(json: &Value) -> Result<HashMap<String, FetchedVector>> {
    let container = json
        .get("vectors")
        .or_else(|| json.get("records"))
        .ok_or_else(|| anyhow::anyhow!("Unsupported fetch response shape: no vectors/records"))?;

    let mut out = HashMap::new();

    match container {
        Value::Object(entries) => {
            for (id, record) in entries {
                out.insert(id.clone(), parse_fetched_record(record));
            }
        }
        Value::Array(items) => {
            for record in items {
                let id = record
                    .get("id")
                    .or_else(|| record.get("_id"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        anyhow::anyhow!("Unsupported fetch response shape: record without id")
                    })?;
                out.insert(id.to_string(), parse_fetched_record(record));
            }
        }
        _ => bail!("Unsupported fetch response shape: {}", container),
    }

    Ok(out)
}

fn parse_fetched_record(record: &Value) -> FetchedVector {
    // Some shapes nest the payload under a "vector" key.
    let payload = record.get("vector").unwrap_or(record);

    let values = payload.get("values").and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .map(|x| x.as_f64().unwrap_or(0.0) as f32)
            .collect()
    });

    let metadata = payload.get("metadata").filter(|m| !m.is_null()).cloned();

    FetchedVector { values, metadata }
}
