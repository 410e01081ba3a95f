//! Client for the external vector database (Qdrant-style REST API).
//!
//! The engine never assumes read-your-write consistency from the backend.
//! Full reindexes build a fresh generation-suffixed collection and swap the
//! current collection name once the build completes; that swap is the
//! linearization point readers observe.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::VectorConfig;
use crate::types::SearchFilters;

/// Stable FNV-1a hash of a chunk id; the integer point id the backend sees.
pub fn point_id(chunk_id: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in chunk_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Payload stored alongside each chunk vector; carries everything ranking
/// needs without a corpus lookup on the backend side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub document_id: String,
    pub chunk_id: String,
    pub ordinal: usize,
    pub title: String,
    pub content_type: String,
    #[serde(default)]
    pub published_ts: Option<i64>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VectorStats {
    pub vector_count: u64,
    pub indexed_count: u64,
    pub status: String,
}

/// Partial-success report for a batched upsert.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub upserted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()>;
    async fn upsert(&self, name: &str, points: &[VectorPoint]) -> Result<()>;
    /// Chunk-level hits; the caller deduplicates per document.
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilters>,
    ) -> Result<Vec<ScoredDocument>>;
    async fn delete_document(&self, name: &str, document_id: &str) -> Result<()>;
    async fn drop_collection(&self, name: &str) -> Result<()>;
    async fn stats(&self, name: &str) -> Result<VectorStats>;
}

pub struct QdrantBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantBackend {
    pub fn new(config: &VectorConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build vector DB HTTP client")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(ref key) = self.api_key {
            builder = builder.header("api-key", key.clone());
        }
        builder
    }

    async fn expect_ok(response: reqwest::Response, what: &str) -> Result<serde_json::Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read {} response", what))?;
        if !status.is_success() {
            let preview: String = body.chars().take(200).collect();
            return Err(anyhow!("{} failed with HTTP {}: {}", what, status, preview));
        }
        serde_json::from_str(&body)
            .with_context(|| format!("{} returned non-JSON body", what))
    }

    fn build_filter(filter: &SearchFilters) -> serde_json::Value {
        let mut must = Vec::new();
        if !filter.content_types.is_empty() {
            must.push(json!({"key": "content_type", "match": {"any": filter.content_types}}));
        }
        if !filter.categories.is_empty() {
            must.push(json!({"key": "categories", "match": {"any": filter.categories}}));
        }
        if !filter.tags.is_empty() {
            must.push(json!({"key": "tags", "match": {"any": filter.tags}}));
        }
        if let Some(ref author) = filter.author {
            must.push(json!({"key": "author", "match": {"value": author}}));
        }
        if filter.date_from.is_some() || filter.date_to.is_some() {
            let mut range = serde_json::Map::new();
            if let Some(from) = filter.date_from {
                range.insert("gte".into(), json!(from.timestamp()));
            }
            if let Some(to) = filter.date_to {
                range.insert("lte".into(), json!(to.timestamp()));
            }
            must.push(json!({"key": "published_ts", "range": range}));
        }
        json!({ "must": must })
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{}", name))
            .send()
            .await
            .context("vector DB unreachable")?;
        if response.status().is_success() {
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });
        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{}", name))
            .json(&body)
            .send()
            .await
            .context("vector DB unreachable")?;
        Self::expect_ok(response, "create collection").await?;
        tracing::info!(collection = %name, dimension, "created vector collection");
        Ok(())
    }

    async fn upsert(&self, name: &str, points: &[VectorPoint]) -> Result<()> {
        let body = json!({
            "points": points
                .iter()
                .map(|p| json!({"id": p.id, "vector": p.vector, "payload": p.payload}))
                .collect::<Vec<_>>()
        });
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", name),
            )
            .json(&body)
            .send()
            .await
            .context("vector DB unreachable")?;
        Self::expect_ok(response, "upsert points").await?;
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilters>,
    ) -> Result<Vec<ScoredDocument>> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = Self::build_filter(filter);
        }
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", name),
            )
            .json(&body)
            .send()
            .await
            .context("vector DB unreachable")?;
        let value = Self::expect_ok(response, "vector search").await?;

        let hits = value["result"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let document_id = hit["payload"]["document_id"].as_str()?.to_string();
                let score = hit["score"].as_f64()? as f32;
                Some(ScoredDocument {
                    document_id,
                    score,
                })
            })
            .collect())
    }

    async fn delete_document(&self, name: &str, document_id: &str) -> Result<()> {
        let body = json!({
            "filter": {
                "must": [{"key": "document_id", "match": {"value": document_id}}]
            }
        });
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", name),
            )
            .json(&body)
            .send()
            .await
            .context("vector DB unreachable")?;
        Self::expect_ok(response, "delete points").await?;
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/collections/{}", name))
            .send()
            .await
            .context("vector DB unreachable")?;
        // Dropping an absent collection is fine.
        if response.status().as_u16() == 404 {
            return Ok(());
        }
        Self::expect_ok(response, "drop collection").await?;
        Ok(())
    }

    async fn stats(&self, name: &str) -> Result<VectorStats> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{}", name))
            .send()
            .await
            .context("vector DB unreachable")?;
        let value = Self::expect_ok(response, "collection info").await?;
        let result = &value["result"];
        Ok(VectorStats {
            vector_count: result["points_count"].as_u64().unwrap_or(0),
            indexed_count: result["indexed_vectors_count"]
                .as_u64()
                .unwrap_or_else(|| result["points_count"].as_u64().unwrap_or(0)),
            status: result["status"].as_str().unwrap_or("unknown").to_string(),
        })
    }
}

/// The engine-facing handle: batching, per-document deduplication, and the
/// current-collection swap for atomic full reindexes.
pub struct VectorIndex {
    backend: Arc<dyn VectorBackend>,
    dimension: usize,
    batch_size: usize,
    current: RwLock<String>,
    generation: AtomicU64,
}

impl VectorIndex {
    pub fn new(backend: Arc<dyn VectorBackend>, config: &VectorConfig) -> Self {
        Self {
            backend,
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
            current: RwLock::new(config.collection.clone()),
            generation: AtomicU64::new(1),
        }
    }

    pub fn current_collection(&self) -> String {
        self.current.read().clone()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn ensure_ready(&self) -> Result<()> {
        let collection = self.current_collection();
        self.backend
            .ensure_collection(&collection, self.dimension)
            .await
    }

    /// Upsert chunk points in capped batches. A failing batch fails only
    /// itself; the outcome reports partial success.
    pub async fn upsert_chunks(
        &self,
        collection: Option<&str>,
        points: Vec<VectorPoint>,
    ) -> UpsertOutcome {
        let collection = collection
            .map(str::to_string)
            .unwrap_or_else(|| self.current_collection());
        let mut outcome = UpsertOutcome::default();
        for batch in points.chunks(self.batch_size) {
            match self.backend.upsert(&collection, batch).await {
                Ok(()) => outcome.upserted += batch.len(),
                Err(e) => {
                    outcome.failed += batch.len();
                    outcome.errors.push(format!("{:#}", e));
                    tracing::warn!(
                        collection = %collection,
                        batch_size = batch.len(),
                        error = %e,
                        "vector upsert batch failed"
                    );
                }
            }
        }
        outcome
    }

    /// Nearest-neighbor search, deduplicated per document by max chunk
    /// score, clamped to [0, 1], ties broken by document id ascending.
    pub async fn semantic_search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&SearchFilters>,
    ) -> Result<Vec<ScoredDocument>> {
        let collection = self.current_collection();
        // Fetch extra chunk-level hits: several chunks of one document can
        // crowd out other documents otherwise.
        let chunk_limit = limit.saturating_mul(3).max(limit);
        let hits = self
            .backend
            .search(&collection, vector, chunk_limit, filter)
            .await?;

        let mut best: HashMap<String, f32> = HashMap::new();
        for hit in hits {
            let score = hit.score.clamp(0.0, 1.0);
            best.entry(hit.document_id)
                .and_modify(|s| *s = s.max(score))
                .or_insert(score);
        }
        let mut deduped: Vec<ScoredDocument> = best
            .into_iter()
            .map(|(document_id, score)| ScoredDocument {
                document_id,
                score,
            })
            .collect();
        deduped.sort_unstable_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        deduped.truncate(limit);
        Ok(deduped)
    }

    pub async fn delete(&self, document_id: &str) -> Result<()> {
        let collection = self.current_collection();
        self.backend.delete_document(&collection, document_id).await
    }

    pub async fn stats(&self) -> Result<VectorStats> {
        let collection = self.current_collection();
        self.backend.stats(&collection).await
    }

    /// Create the next-generation collection for a full rebuild. Searches
    /// keep hitting the current collection until `commit_rebuild`.
    pub async fn begin_rebuild(&self, base_name: &str) -> Result<String> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-g{}", base_name, generation);
        self.backend
            .ensure_collection(&name, self.dimension)
            .await?;
        Ok(name)
    }

    /// Swap the freshly built collection in; this is the linearization
    /// point of a full reindex. The old collection is dropped best-effort.
    pub async fn commit_rebuild(&self, new_collection: String) {
        let old = {
            let mut current = self.current.write();
            std::mem::replace(&mut *current, new_collection.clone())
        };
        tracing::info!(from = %old, to = %new_collection, "swapped vector collection");
        if old != new_collection {
            if let Err(e) = self.backend.drop_collection(&old).await {
                tracing::warn!(collection = %old, error = %e, "failed to drop old collection");
            }
        }
    }
}
