use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiftConfig {
    pub vector: VectorConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub content: ContentConfig,
    pub chunking: ChunkingConfig,
    pub search: SearchTuning,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Base collection name; full reindexes append a generation suffix.
    pub collection: String,
    pub dimension: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    /// Bounded LRU for query vectors.
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_in_flight: usize,
    /// Queued calls beyond the in-flight bound; overflow fails fast.
    pub queue_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub types: Vec<String>,
    pub page_size: usize,
    pub max_pages: usize,
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTuning {
    pub default_ai_weight: f32,
    pub rrf_k: usize,
    /// Candidates sent to the LLM reranker; the rest keep estimated scores.
    pub rerank_top: usize,
    /// Per-stream retrieval depth.
    pub candidate_limit: usize,
    pub max_query_variants: usize,
    pub variant_concurrency: usize,
    pub request_timeout_secs: u64,
    pub max_features: usize,
    /// Top results fed to strict-mode answer synthesis.
    pub answer_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    /// Inbound requests per second before 429.
    pub rate_limit_per_sec: u32,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            vector: VectorConfig {
                url: "http://localhost:6333".to_string(),
                api_key: None,
                collection: "sift_content".to_string(),
                dimension: 384,
                batch_size: 50,
            },
            embedding: EmbeddingConfig {
                url: "http://localhost:8080/v1/embeddings".to_string(),
                api_key: None,
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
                cache_size: 1000,
                cache_ttl_secs: 24 * 3600,
            },
            llm: LlmConfig {
                url: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 15,
                max_in_flight: 16,
                queue_limit: 64,
            },
            content: ContentConfig {
                base_url: "http://localhost/wp-json/wp/v2".to_string(),
                api_key: None,
                types: vec!["post".to_string(), "page".to_string()],
                page_size: 50,
                max_pages: 100,
                max_in_flight: 8,
            },
            chunking: ChunkingConfig {
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            search: SearchTuning {
                default_ai_weight: 0.7,
                rrf_k: 60,
                rerank_top: 20,
                candidate_limit: 100,
                max_query_variants: 3,
                variant_concurrency: 8,
                request_timeout_secs: 30,
                max_features: 10_000,
                answer_top_n: 5,
            },
            server: ServerConfig {
                bind: "127.0.0.1:8787".to_string(),
                rate_limit_per_sec: 20,
            },
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

impl SiftConfig {
    /// Build from environment variables, falling back to defaults for
    /// anything unset. `SIFT_*` names mirror the config tree.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_var("SIFT_VECTOR_URL") {
            config.vector.url = v;
        }
        config.vector.api_key = env_var("SIFT_VECTOR_API_KEY");
        if let Some(v) = env_var("SIFT_VECTOR_COLLECTION") {
            config.vector.collection = v;
        }
        if let Some(v) = env_parse("SIFT_EMBEDDING_DIMENSION") {
            config.vector.dimension = v;
            config.embedding.dimension = v;
        }

        if let Some(v) = env_var("SIFT_EMBEDDING_URL") {
            config.embedding.url = v;
        }
        config.embedding.api_key = env_var("SIFT_EMBEDDING_API_KEY");
        if let Some(v) = env_var("SIFT_EMBEDDING_MODEL") {
            config.embedding.model = v;
        }

        if let Some(v) = env_var("SIFT_LLM_URL") {
            config.llm.url = v;
        }
        config.llm.api_key = env_var("SIFT_LLM_API_KEY");
        if let Some(v) = env_var("SIFT_LLM_MODEL") {
            config.llm.model = v;
        }
        if let Some(v) = env_parse("SIFT_LLM_TIMEOUT_SECS") {
            config.llm.timeout_secs = v;
        }

        if let Some(v) = env_var("SIFT_CONTENT_URL") {
            config.content.base_url = v;
        }
        config.content.api_key = env_var("SIFT_CONTENT_API_KEY");
        if let Some(v) = env_var("SIFT_CONTENT_TYPES") {
            config.content.types = v
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }

        if let Some(v) = env_parse("SIFT_CHUNK_SIZE") {
            config.chunking.chunk_size = v;
        }
        if let Some(v) = env_parse("SIFT_CHUNK_OVERLAP") {
            config.chunking.chunk_overlap = v;
        }
        if let Some(v) = env_parse("SIFT_AI_WEIGHT") {
            config.search.default_ai_weight = v;
        }
        if let Some(v) = env_parse("SIFT_REQUEST_TIMEOUT_SECS") {
            config.search.request_timeout_secs = v;
        }
        if let Some(v) = env_var("SIFT_BIND") {
            config.server.bind = v;
        }
        if let Some(v) = env_parse("SIFT_RATE_LIMIT_PER_SEC") {
            config.server.rate_limit_per_sec = v;
        }

        config
    }

    /// Reject clearly broken configurations before the engine starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.vector.dimension == 0 {
            return Err("vector.dimension must be > 0".into());
        }
        if self.vector.dimension != self.embedding.dimension {
            return Err("vector.dimension must match embedding.dimension".into());
        }
        if self.vector.batch_size == 0 {
            return Err("vector.batch_size must be > 0".into());
        }
        if self.chunking.chunk_size < 100 {
            return Err("chunking.chunk_size must be >= 100".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        if !(0.0..=1.0).contains(&self.search.default_ai_weight) {
            return Err("search.default_ai_weight must be in [0.0, 1.0]".into());
        }
        if self.search.max_query_variants == 0 {
            return Err("search.max_query_variants must be > 0".into());
        }
        if self.search.max_features == 0 {
            return Err("search.max_features must be > 0".into());
        }
        if self.content.page_size == 0 || self.content.page_size > 100 {
            return Err("content.page_size must be in [1, 100]".into());
        }
        Ok(())
    }
}
