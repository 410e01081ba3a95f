//! Text embedding via an external batch service, with a bounded LRU for
//! query vectors. The cache is advisory: a miss (or an expired entry) just
//! re-embeds, and backend failures degrade the semantic path rather than
//! failing the request.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::EmbeddingConfig;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI-compatible `/v1/embeddings` backend.
pub struct HttpEmbeddingBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl HttpEmbeddingBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "model": self.model, "input": texts }));
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!("embedding request to {} timed out", self.url)
            } else {
                anyhow!("embedding request to {} failed: {}", self.url, e)
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read embedding response body")?;
        if !status.is_success() {
            let preview: String = body.chars().take(200).collect();
            return Err(anyhow!(
                "embedding service returned HTTP {}: {}",
                status,
                preview
            ));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            anyhow!("failed to parse embedding response: {} ({})", e, preview)
        })?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "embedding service returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            ));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// All-zero vectors mean "no embedding"; semantic search is skipped.
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|v| v.abs() < f32::EPSILON)
}

struct CachedVector {
    vector: Arc<Vec<f32>>,
    inserted_at: Instant,
}

pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    dimension: usize,
    cache: Mutex<LruCache<String, CachedVector>>,
    ttl: Duration,
}

impl Embedder {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        dimension: usize,
        cache_size: usize,
        ttl: Duration,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size.max(1)).expect("capacity is nonzero");
        Self {
            backend,
            dimension,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Embed a batch of chunk texts. A dimension mismatch is a hard error:
    /// vectors of the wrong size would poison the collection.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.backend.embed(texts).await?;
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(anyhow!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.len()
                ));
            }
        }
        Ok(vectors)
    }

    /// Embed a query, memoized by its normalized form. Returns `Ok(None)`
    /// when the service produced an all-zero vector (no embedding);
    /// `Err` means the backend itself failed.
    pub async fn embed_query(&self, text: &str) -> Result<Option<Arc<Vec<f32>>>> {
        let key = normalize_query(text);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(Some(hit));
        }

        let mut vectors = self.backend.embed(&[text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding service returned no vector"))?;
        if vector.len() != self.dimension {
            return Err(anyhow!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            ));
        }
        if is_zero_vector(&vector) {
            return Ok(None);
        }

        let vector = Arc::new(vector);
        self.cache.lock().put(
            key,
            CachedVector {
                vector: vector.clone(),
                inserted_at: Instant::now(),
            },
        );
        Ok(Some(vector))
    }

    fn cache_get(&self, key: &str) -> Option<Arc<Vec<f32>>> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.vector.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }
}

/// Cache key: lowercased with whitespace collapsed, so trivially different
/// spellings of the same query share one entry.
fn normalize_query(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingBackend for CountingBackend {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![0.5; self.dimension]).collect())
        }
    }

    fn embedder(dimension: usize) -> (Arc<CountingBackend>, Embedder) {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            dimension,
        });
        let embedder = Embedder::new(
            backend.clone(),
            384,
            100,
            Duration::from_secs(24 * 3600),
        );
        (backend, embedder)
    }

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Hello   WORLD "), "hello world");
    }

    #[test]
    fn zero_vector_detection() {
        assert!(is_zero_vector(&[0.0, 0.0, 0.0]));
        assert!(!is_zero_vector(&[0.0, 0.1, 0.0]));
    }

    #[tokio::test]
    async fn query_embedding_is_memoized() {
        let (backend, embedder) = embedder(384);
        embedder.embed_query("hello world").await.unwrap();
        embedder.embed_query("Hello  World").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_fatal() {
        let (_, embedder) = embedder(128);
        let err = embedder
            .embed_batch(&["text".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn zero_vector_means_no_embedding() {
        struct ZeroBackend;
        #[async_trait]
        impl EmbeddingBackend for ZeroBackend {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0; 384]).collect())
            }
        }
        let embedder = Embedder::new(Arc::new(ZeroBackend), 384, 10, Duration::from_secs(60));
        assert!(embedder.embed_query("anything").await.unwrap().is_none());
    }
}
