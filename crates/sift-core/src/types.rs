use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A taxonomy term (category or tag) as supplied by the CMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub slug: String,
    pub name: String,
}

/// A content document from the CMS feed. Ids are CMS-supplied and stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub excerpt: String,
    pub content_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub categories: Vec<Term>,
    #[serde(default)]
    pub tags: Vec<Term>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub word_count: usize,
}

impl Document {
    /// The text the lexical index is built over.
    pub fn searchable_text(&self) -> String {
        let mut text =
            String::with_capacity(self.title.len() + self.body.len() + self.excerpt.len() + 2);
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.body);
        text.push(' ');
        text.push_str(&self.excerpt);
        text
    }

    /// Word count as reported by the CMS, or derived from the body when absent.
    pub fn effective_word_count(&self) -> usize {
        if self.word_count > 0 {
            self.word_count
        } else {
            self.body.split_whitespace().count()
        }
    }
}

/// An overlapping slice of a document, the unit of embedding.
/// Chunk ids are `documentId#ordinal`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub ordinal: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(document_id: &str, ordinal: usize, text: String) -> Self {
        Self {
            id: format!("{}#{}", document_id, ordinal),
            document_id: document_id.to_string(),
            ordinal,
            text,
        }
    }
}

/// Coarse query category inferred from surface form; steers scoring and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    PersonName,
    ExecutiveRole,
    Service,
    HowTo,
    Navigational,
    Transactional,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::PersonName => "person_name",
            QueryIntent::ExecutiveRole => "executive_role",
            QueryIntent::Service => "service",
            QueryIntent::HowTo => "howto",
            QueryIntent::Navigational => "navigational",
            QueryIntent::Transactional => "transactional",
            QueryIntent::General => "general",
        }
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiplicative boost factors applied during retrieval.
/// Caps: field ≤ 2.0, taxonomy ≤ 1.5, freshness ∈ {1.0, 1.1, 1.2, 1.5}.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoostFactors {
    pub field: f32,
    pub freshness: f32,
    pub taxonomy: f32,
}

impl Default for BoostFactors {
    fn default() -> Self {
        Self {
            field: 1.0,
            freshness: 1.0,
            taxonomy: 1.0,
        }
    }
}

impl BoostFactors {
    pub fn multiplier(&self) -> f32 {
        self.field * self.freshness * self.taxonomy
    }
}

/// Per-request ranking state for one document. Never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub document_id: String,
    pub lexical_score: Option<f32>,
    pub semantic_score: Option<f32>,
    pub boosts: BoostFactors,
    pub rrf_score: f32,
    /// AI relevance in [0, 100] after normalization.
    pub ai_score: Option<f32>,
    pub ai_reason: Option<String>,
    pub score_estimated: bool,
    pub hybrid_score: f32,
    pub priority_index: usize,
}

impl Candidate {
    pub fn new(document_id: String) -> Self {
        Self {
            document_id,
            lexical_score: None,
            semantic_score: None,
            boosts: BoostFactors::default(),
            rrf_score: 0.0,
            ai_score: None,
            ai_reason: None,
            score_estimated: false,
            hybrid_score: 0.0,
            priority_index: usize::MAX,
        }
    }

    /// Base score used when estimating an AI score for candidates the
    /// reranker did not cover. Falls back to the semantic score for
    /// semantic-only candidates so they keep a usable rank.
    pub fn estimation_base(&self) -> f32 {
        self.lexical_score
            .or(self.semantic_score)
            .unwrap_or(0.0)
    }
}

/// Scalar trace of how a result reached its final position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingExplanation {
    pub lexical_score: Option<f32>,
    pub semantic_score: Option<f32>,
    pub field_boost: f32,
    pub freshness_boost: f32,
    pub taxonomy_boost: f32,
    pub rrf_score: f32,
    /// Raw AI relevance in [0, 100].
    pub ai_score: Option<f32>,
    /// AI relevance scaled into [0, 1].
    pub ai_score_normalized: Option<f32>,
    pub score_estimated: bool,
    pub ai_weight: f32,
    pub lexical_weight: f32,
    pub hybrid_score: f32,
    pub priority_index: Option<usize>,
    pub final_position: usize,
}

/// Caller-supplied result filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.content_types.is_empty()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.author.is_none()
            && self.categories.is_empty()
            && self.tags.is_empty()
    }

    /// Post-retrieval check used on the lexical path (the vector backend
    /// applies the equivalent filter server-side).
    pub fn matches(&self, doc: &Document) -> bool {
        if !self.content_types.is_empty() && !self.content_types.contains(&doc.content_type) {
            return false;
        }
        if let Some(from) = self.date_from {
            match doc.published_at {
                Some(date) if date >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.date_to {
            match doc.published_at {
                Some(date) if date <= to => {}
                _ => return false,
            }
        }
        if let Some(ref author) = self.author {
            if !doc.author.eq_ignore_ascii_case(author) {
                return false;
            }
        }
        if !self.categories.is_empty()
            && !doc.categories.iter().any(|c| self.categories.contains(&c.slug))
        {
            return false;
        }
        if !self.tags.is_empty() && !doc.tags.iter().any(|t| self.tags.contains(&t.slug)) {
            return false;
        }
        true
    }
}

fn default_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// `POST /search` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_true")]
    pub enable_reranking: bool,
    #[serde(default)]
    pub ai_weight: Option<f32>,
    #[serde(default)]
    pub rerank_instructions: Option<String>,
    #[serde(default)]
    pub include_answer: bool,
    #[serde(default = "default_true")]
    pub strict_answer: bool,
    #[serde(default)]
    pub post_type_priority: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_query_expansion: bool,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: default_limit(),
            offset: 0,
            enable_reranking: true,
            ai_weight: None,
            rerank_instructions: None,
            include_answer: false,
            strict_answer: true,
            post_type_priority: Vec::new(),
            enable_query_expansion: true,
            filters: None,
        }
    }
}

/// One returned result with its ranking trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub content_type: String,
    pub published_at: Option<DateTime<Utc>>,
    pub score: f32,
    pub explanation: RankingExplanation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub total_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub query: String,
    pub intent: QueryIntent,
    pub intent_instructions: String,
    pub rewritten_query: Option<String>,
    pub alt_queries: Vec<String>,
    pub ai_weight: f32,
    pub lexical_weight: f32,
    pub response_time_ms: u64,
    pub rerank_used: bool,
    pub estimated_scores: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub prompt_versions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub degradations: Vec<String>,
}

/// Strict-mode extractive answer with the sources it cites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub cited_source_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub pagination: Pagination,
    pub metadata: SearchMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<Answer>,
}

/// `POST /index` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexRequest {
    #[serde(default)]
    pub force_full: bool,
    #[serde(default)]
    pub types: Option<Vec<String>>,
}

/// Outcome of an indexing run; partial success carries per-item errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}
