//! The search orchestrator: wires analysis, expansion, retrieval, fusion,
//! reranking, pagination, and answer synthesis into the public `search`
//! operation, and drives the indexing pipeline (fetch → chunk → embed →
//! store + vectors) for full and incremental runs.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::answer::{self, AnswerSource};
use crate::chunker::Chunker;
use crate::config::SiftConfig;
use crate::context::RequestContext;
use crate::embedding::{Embedder, EmbeddingBackend, HttpEmbeddingBackend};
use crate::error::{Result, SearchError};
use crate::fetch::{ContentFetcher, ContentSource, HttpContentSource};
use crate::llm::{ChatBackend, HttpChatBackend, LlmClient, RerankCandidate, RerankOutcome};
use crate::query::{self, QueryExpander};
use crate::rank;
use crate::retrieve::Retriever;
use crate::store::{CorpusSnapshot, DocumentStore};
use crate::suggest::QueryLog;
use crate::types::{
    Answer, Candidate, Chunk, Document, IndexReport, Pagination, QueryIntent, RankingExplanation,
    SearchMetadata, SearchRequest, SearchResponse, SearchResult,
};
use crate::vector::{
    point_id, ChunkPayload, QdrantBackend, VectorBackend, VectorIndex, VectorPoint, VectorStats,
};

const QUERY_MIN_CHARS: usize = 2;
const QUERY_MAX_CHARS: usize = 500;
const LIMIT_MAX: usize = 100;
const EMBED_BATCH: usize = 32;
const INDEX_CHANNEL_DEPTH: usize = 64;

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub documents: usize,
    pub vocabulary_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectors: Option<VectorStats>,
}

pub struct SearchEngine {
    config: SiftConfig,
    store: DocumentStore,
    vector: VectorIndex,
    embedder: Embedder,
    llm: LlmClient,
    chunker: Chunker,
    fetcher: ContentFetcher,
    expander: QueryExpander,
    query_log: QueryLog,
    index_lock: tokio::sync::Mutex<()>,
}

impl SearchEngine {
    /// Assemble the engine from explicit backends; tests inject fakes here.
    pub fn with_backends(
        config: SiftConfig,
        vector_backend: Arc<dyn VectorBackend>,
        embedding_backend: Arc<dyn EmbeddingBackend>,
        chat_backend: Arc<dyn ChatBackend>,
        content_source: Arc<dyn ContentSource>,
    ) -> Self {
        let store = DocumentStore::new(config.search.max_features);
        let vector = VectorIndex::new(vector_backend, &config.vector);
        let embedder = Embedder::new(
            embedding_backend,
            config.embedding.dimension,
            config.embedding.cache_size,
            Duration::from_secs(config.embedding.cache_ttl_secs),
        );
        let llm = LlmClient::new(chat_backend, &config.llm);
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
        let fetcher = ContentFetcher::new(content_source, &config.content);
        let expander = QueryExpander::new(config.search.max_query_variants);
        Self {
            config,
            store,
            vector,
            embedder,
            llm,
            chunker,
            fetcher,
            expander,
            query_log: QueryLog::default(),
            index_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Production wiring: HTTP backends for every external collaborator.
    pub fn from_config(config: SiftConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
        let vector_backend = Arc::new(QdrantBackend::new(&config.vector)?);
        let embedding_backend = Arc::new(HttpEmbeddingBackend::new(&config.embedding)?);
        let chat_backend = Arc::new(HttpChatBackend::new(&config.llm)?);
        let content_source = Arc::new(HttpContentSource::new(&config.content)?);
        Ok(Self::with_backends(
            config,
            vector_backend,
            embedding_backend,
            chat_backend,
            content_source,
        ))
    }

    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    /// Create (or verify) the current vector collection. Useful at startup
    /// so a misconfigured vector DB surfaces immediately.
    pub async fn vector_ready(&self) -> anyhow::Result<()> {
        self.vector.ensure_ready().await
    }

    /// A context carrying the default request deadline.
    pub fn new_context(&self) -> RequestContext {
        RequestContext::new(Duration::from_secs(self.config.search.request_timeout_secs))
    }

    /// Public search entry point. The request deadline cancels the whole
    /// pipeline; completed partial work is discarded and the caller gets a
    /// timeout error.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        request: SearchRequest,
    ) -> Result<SearchResponse> {
        match tokio::time::timeout_at(ctx.deadline(), self.search_inner(ctx, request)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(
                self.config.search.request_timeout_secs * 1_000,
            )),
        }
    }

    async fn search_inner(
        &self,
        ctx: &RequestContext,
        request: SearchRequest,
    ) -> Result<SearchResponse> {
        let started = std::time::Instant::now();
        validate_request(&request)?;
        let query = request.query.trim().to_string();

        let analysis = query::analyze(&query, request.rerank_instructions.as_deref());
        tracing::debug!(
            request_id = %ctx.request_id(),
            query = %query,
            intent = %analysis.intent,
            "search request accepted"
        );

        // One snapshot for the life of the request.
        let snapshot = self.store.snapshot();

        let (variants, rewritten_query) = self
            .build_variants(ctx, &query, request.enable_query_expansion)
            .await;

        let retriever = Retriever {
            snapshot: &snapshot,
            vector: &self.vector,
            embedder: &self.embedder,
            limit: self.config.search.candidate_limit,
            concurrency: self.config.search.variant_concurrency,
        };
        let retrieved = retriever.run(ctx, &variants, request.filters.as_ref()).await;

        let mut candidates = rank::fuse(
            &retrieved.lexical,
            &retrieved.semantic,
            &retrieved.boosts,
            self.config.search.rrf_k,
        );

        let (rerank_used, estimated_scores) = self
            .apply_reranking(ctx, &request, &query, &analysis.instructions, analysis.intent, &snapshot, &mut candidates)
            .await;

        let base_weight = request
            .ai_weight
            .unwrap_or(self.config.search.default_ai_weight)
            .clamp(0.0, 1.0);
        let ai_weight = rank::dynamic_ai_weight(base_weight, &query, analysis.intent);
        let lexical_weight = 1.0 - ai_weight;

        let priority = &request.post_type_priority;
        rank::score_and_sort(&mut candidates, ai_weight, |id| {
            snapshot
                .lookup(id)
                .and_then(|doc| priority.iter().position(|t| *t == doc.content_type))
                .unwrap_or(priority.len())
        });

        let total_results = candidates.len();
        let results = self.build_results(
            &snapshot,
            &candidates,
            request.offset,
            request.limit,
            ai_weight,
            lexical_weight,
            priority.len(),
        );

        let answer = if request.include_answer {
            self.build_answer(ctx, &query, &snapshot, &candidates).await
        } else {
            None
        };
        if request.include_answer && answer.is_none() {
            ctx.record_degradation("answer synthesis unavailable");
        }

        let alt_queries = self.build_alt_queries(ctx, &query, &snapshot, &candidates).await;

        self.query_log.record(&query);

        let tokens = ctx.tokens_used();
        let response = SearchResponse {
            pagination: Pagination {
                offset: request.offset,
                limit: request.limit,
                has_more: request.offset + results.len() < total_results,
                total_results,
            },
            results,
            metadata: SearchMetadata {
                query,
                intent: analysis.intent,
                intent_instructions: analysis.instructions,
                rewritten_query,
                alt_queries,
                ai_weight,
                lexical_weight,
                response_time_ms: started.elapsed().as_millis() as u64,
                rerank_used,
                estimated_scores,
                tokens_used: (tokens > 0).then_some(tokens),
                prompt_versions: ctx.prompt_versions(),
                degradations: ctx.degradations(),
            },
            answer,
        };
        Ok(response)
    }

    /// Variant 0 is always the original. Expansion adds deterministic
    /// synonym variants and, when the LLM cooperates, a rewrite and its
    /// alternatives. The rewrite never replaces the original query.
    async fn build_variants(
        &self,
        ctx: &RequestContext,
        query: &str,
        enable_expansion: bool,
    ) -> (Vec<String>, Option<String>) {
        if !enable_expansion || self.expander.should_skip(query) {
            return (vec![query.to_string()], None);
        }

        let variants = self.expander.expand_deterministic(query);
        let mut rewritten = None;
        let mut llm_lines = Vec::new();
        if let Some(rewrite) = self.llm.rewrite(ctx, query).await {
            let changed = rewrite.rewritten_query.to_lowercase() != query.to_lowercase();
            if changed {
                rewritten = Some(rewrite.rewritten_query.clone());
                llm_lines.push(rewrite.rewritten_query);
            }
            llm_lines.extend(rewrite.alternative_queries);
        }
        (self.expander.merge_llm_variants(variants, llm_lines), rewritten)
    }

    /// Returns (rerank_used, any_estimated). Every candidate leaves with an
    /// AI score: judged for the top M when the LLM cooperates, estimated
    /// otherwise.
    async fn apply_reranking(
        &self,
        ctx: &RequestContext,
        request: &SearchRequest,
        query: &str,
        instructions: &str,
        intent: QueryIntent,
        snapshot: &CorpusSnapshot,
        candidates: &mut [Candidate],
    ) -> (bool, bool) {
        if !request.enable_reranking || candidates.is_empty() {
            rank::rerank::estimate_all(candidates);
            return (false, !candidates.is_empty());
        }

        let top_m = self.config.search.rerank_top.min(candidates.len());
        let judged_ids: HashSet<String> = candidates[..top_m]
            .iter()
            .map(|c| c.document_id.clone())
            .collect();
        let rerank_candidates: Vec<RerankCandidate> = candidates[..top_m]
            .iter()
            .filter_map(|c| {
                let doc = snapshot.lookup(&c.document_id)?;
                Some(RerankCandidate {
                    id: doc.id.clone(),
                    title: doc.title.clone(),
                    excerpt: excerpt_of(&doc),
                    content_type: doc.content_type.clone(),
                    published: doc.published_at,
                    word_count: doc.effective_word_count(),
                    categories: doc.categories.iter().map(|t| t.name.clone()).collect(),
                    tags: doc.tags.iter().map(|t| t.name.clone()).collect(),
                    lexical_score: c.lexical_score.unwrap_or(0.0),
                })
            })
            .collect();

        match self
            .llm
            .rerank(ctx, query, instructions, intent, &rerank_candidates)
            .await
        {
            RerankOutcome::Scored(judgements) if !judgements.is_empty() => {
                let any_estimated =
                    rank::rerank::apply_judgements(candidates, judgements, &judged_ids);
                (true, any_estimated)
            }
            RerankOutcome::Scored(_) | RerankOutcome::Unavailable(_) => {
                rank::rerank::estimate_all(candidates);
                (false, true)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_results(
        &self,
        snapshot: &CorpusSnapshot,
        candidates: &[Candidate],
        offset: usize,
        limit: usize,
        ai_weight: f32,
        lexical_weight: f32,
        priority_len: usize,
    ) -> Vec<SearchResult> {
        candidates
            .iter()
            .enumerate()
            .skip(offset)
            .take(limit)
            .filter_map(|(position, candidate)| {
                let doc = snapshot.lookup(&candidate.document_id)?;
                Some(SearchResult {
                    id: doc.id.clone(),
                    title: doc.title.clone(),
                    url: doc.url.clone(),
                    excerpt: excerpt_of(&doc),
                    content_type: doc.content_type.clone(),
                    published_at: doc.published_at,
                    score: candidate.hybrid_score,
                    explanation: RankingExplanation {
                        lexical_score: candidate.lexical_score,
                        semantic_score: candidate.semantic_score,
                        field_boost: candidate.boosts.field,
                        freshness_boost: candidate.boosts.freshness,
                        taxonomy_boost: candidate.boosts.taxonomy,
                        rrf_score: candidate.rrf_score,
                        ai_score: candidate.ai_score,
                        ai_score_normalized: candidate.ai_score.map(|s| s / 100.0),
                        score_estimated: candidate.score_estimated,
                        ai_weight,
                        lexical_weight,
                        hybrid_score: candidate.hybrid_score,
                        priority_index: (candidate.priority_index < priority_len)
                            .then_some(candidate.priority_index),
                        final_position: position,
                    },
                })
            })
            .collect()
    }

    async fn build_answer(
        &self,
        ctx: &RequestContext,
        query: &str,
        snapshot: &CorpusSnapshot,
        candidates: &[Candidate],
    ) -> Option<Answer> {
        let sources: Vec<AnswerSource> = candidates
            .iter()
            .take(self.config.search.answer_top_n)
            .filter_map(|c| {
                let doc = snapshot.lookup(&c.document_id)?;
                Some(AnswerSource {
                    id: doc.id.clone(),
                    title: doc.title.clone(),
                    excerpt: excerpt_of(&doc),
                })
            })
            .collect();
        answer::synthesize(&self.llm, ctx, query, &sources).await
    }

    /// Content-grounded alternative queries; for an empty result set there
    /// is no content to ground on, so plain rephrasings stand in.
    async fn build_alt_queries(
        &self,
        ctx: &RequestContext,
        query: &str,
        snapshot: &CorpusSnapshot,
        candidates: &[Candidate],
    ) -> Vec<String> {
        let top: Vec<(String, String)> = candidates
            .iter()
            .take(self.config.search.answer_top_n)
            .filter_map(|c| {
                let doc = snapshot.lookup(&c.document_id)?;
                Some((doc.title.clone(), excerpt_of(&doc)))
            })
            .collect();
        if top.is_empty() {
            self.llm.expand(ctx, query, 3).await
        } else {
            self.llm.alternative_queries(ctx, query, &top).await
        }
    }

    // ---- Indexing ----

    /// `POST /index`: full rebuild (build-then-swap) or incremental upsert.
    pub async fn index_documents(
        &self,
        types: Option<Vec<String>>,
        force_full: bool,
    ) -> Result<IndexReport> {
        let types = types.unwrap_or_else(|| self.config.content.types.clone());
        if force_full {
            self.full_reindex(&types).await
        } else {
            self.incremental_index(&types).await
        }
    }

    async fn full_reindex(&self, types: &[String]) -> Result<IndexReport> {
        let _guard = self.index_lock.lock().await;
        let started = std::time::Instant::now();

        // The vector DB is essential for a full rebuild.
        let build_collection = self
            .vector
            .begin_rebuild(&self.config.vector.collection)
            .await
            .map_err(|e| {
                SearchError::DependencyFatal(format!("vector DB unavailable for reindex: {:#}", e))
            })?;

        let (tx, rx) = mpsc::channel(INDEX_CHANNEL_DEPTH);
        let fetch = self.fetcher.stream_documents(types, tx);
        let consume = self.consume_feed(rx, Some(&build_collection));
        let (fetch_report, consumed) = tokio::join!(fetch, consume);
        let consumed = consumed?;

        // Rebuild the lexical matrix and swap both stores; searches started
        // before this point keep their snapshot and the old collection.
        self.store.replace_all(consumed.documents);
        self.vector.commit_rebuild(build_collection).await;

        let mut report = consumed.report;
        report.skipped += fetch_report.skipped_types.len();
        report.errors.extend(fetch_report.errors);
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            indexed = report.indexed,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "full reindex complete"
        );
        Ok(report)
    }

    async fn incremental_index(&self, types: &[String]) -> Result<IndexReport> {
        let _guard = self.index_lock.lock().await;
        let started = std::time::Instant::now();

        if let Err(e) = self.vector.ensure_ready().await {
            tracing::warn!(error = %e, "vector DB unavailable, indexing lexical only");
        }

        let (tx, rx) = mpsc::channel(INDEX_CHANNEL_DEPTH);
        let fetch = self.fetcher.stream_documents(types, tx);
        let consume = self.consume_feed(rx, None);
        let (fetch_report, consumed) = tokio::join!(fetch, consume);
        let consumed = consumed?;

        self.store.upsert_documents(consumed.documents);

        let mut report = consumed.report;
        report.skipped += fetch_report.skipped_types.len();
        report.errors.extend(fetch_report.errors);
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// `POST /index-single`: upsert one document by id.
    pub async fn index_single(&self, document: Document) -> Result<IndexReport> {
        if document.id.trim().is_empty() {
            return Err(SearchError::Validation("document id must not be empty".into()));
        }
        let started = std::time::Instant::now();
        let mut report = IndexReport::default();

        match self.embed_document(&document).await {
            Ok(points) => {
                // Replace any previous chunks: the new chunking may be
                // shorter than the old one.
                if let Err(e) = self.vector.delete(&document.id).await {
                    tracing::warn!(document_id = %document.id, error = %e, "stale vector cleanup failed");
                }
                let outcome = self.vector.upsert_chunks(None, points).await;
                if outcome.failed > 0 {
                    report.errors.extend(outcome.errors);
                }
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("{}: embedding failed: {:#}", document.id, e));
            }
        }

        self.store.upsert_documents(vec![document]);
        report.indexed = 1;
        report.failed = usize::from(!report.errors.is_empty());
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// `GET /document/{id}`: unknown ids are a 404, unlike delete.
    pub fn get_document(&self, id: &str) -> Result<Document> {
        self.store
            .lookup(id)
            .map(|doc| (*doc).clone())
            .ok_or_else(|| SearchError::NotFound(format!("document {}", id)))
    }

    /// `DELETE /document/{id}`: idempotent; absence is success.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.store.delete_document(id);
        if let Err(e) = self.vector.delete(id).await {
            // Retrieval filters against the live corpus, so a failed vector
            // delete cannot resurrect the document in results.
            tracing::warn!(document_id = %id, error = %e, "vector delete failed");
        }
        Ok(())
    }

    pub async fn health(&self) -> HealthReport {
        let mut components = HashMap::new();
        let store_stats = self.store.stats();
        components.insert(
            "document_store".to_string(),
            ComponentHealth {
                status: "ok".into(),
                detail: Some(format!("{} documents", store_stats.documents)),
            },
        );

        let vector_ok = match self.vector.stats().await {
            Ok(stats) => {
                components.insert(
                    "vector_index".to_string(),
                    ComponentHealth {
                        status: "ok".into(),
                        detail: Some(format!("{} vectors ({})", stats.vector_count, stats.status)),
                    },
                );
                true
            }
            Err(e) => {
                components.insert(
                    "vector_index".to_string(),
                    ComponentHealth {
                        status: "unavailable".into(),
                        detail: Some(format!("{:#}", e)),
                    },
                );
                false
            }
        };

        components.insert(
            "llm".to_string(),
            ComponentHealth {
                status: if self.config.llm.api_key.is_some() {
                    "configured".into()
                } else {
                    "unauthenticated".into()
                },
                detail: None,
            },
        );

        HealthReport {
            // The lexical path is in-process, so losing the vector DB
            // degrades rather than kills search.
            status: if vector_ok { "healthy" } else { "degraded" }.into(),
            components,
        }
    }

    pub async fn stats(&self) -> StatsReport {
        let store_stats = self.store.stats();
        StatsReport {
            documents: store_stats.documents,
            vocabulary_size: store_stats.vocabulary_size,
            vectors: self.vector.stats().await.ok(),
        }
    }

    /// Completions from the popular-query log, topped up with synonym
    /// variants when the log is thin.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        let limit = limit.clamp(1, 20);
        let mut suggestions = self.query_log.suggest(query, limit);
        if suggestions.len() < limit {
            for variant in self.expander.expand_deterministic(query).into_iter().skip(1) {
                if suggestions.len() >= limit {
                    break;
                }
                if !suggestions.iter().any(|s| s.eq_ignore_ascii_case(&variant)) {
                    suggestions.push(variant);
                }
            }
        }
        suggestions
    }

    // ---- indexing internals ----

    async fn embed_document(&self, document: &Document) -> anyhow::Result<Vec<VectorPoint>> {
        let chunks = self.chunker.chunk_document(document);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| point_from(document, &chunk, vector))
            .collect())
    }

    async fn consume_feed(
        &self,
        mut rx: mpsc::Receiver<Document>,
        collection: Option<&str>,
    ) -> Result<ConsumedFeed> {
        let mut documents: Vec<Document> = Vec::new();
        let mut report = IndexReport::default();
        let mut failed_docs: HashSet<usize> = HashSet::new();
        let mut pending: Vec<(usize, Chunk)> = Vec::new();

        while let Some(document) = rx.recv().await {
            let doc_index = documents.len();
            for chunk in self.chunker.chunk_document(&document) {
                pending.push((doc_index, chunk));
            }
            documents.push(document);
            if pending.len() >= EMBED_BATCH {
                let batch = std::mem::take(&mut pending);
                self.flush_batch(batch, &documents, collection, &mut report, &mut failed_docs)
                    .await?;
            }
        }
        if !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            self.flush_batch(batch, &documents, collection, &mut report, &mut failed_docs)
                .await?;
        }

        report.failed = failed_docs.len();
        report.indexed = documents.len() - failed_docs.len();
        Ok(ConsumedFeed { documents, report })
    }

    /// Embed and upsert one batch of chunks. Embedding-service failures
    /// fail the batch's documents but not the run; a dimension mismatch
    /// can never succeed and aborts the whole operation.
    async fn flush_batch(
        &self,
        batch: Vec<(usize, Chunk)>,
        documents: &[Document],
        collection: Option<&str>,
        report: &mut IndexReport,
        failed_docs: &mut HashSet<usize>,
    ) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|(_, c)| c.text.clone()).collect();
        let vectors = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => vectors,
            Err(e) if e.to_string().contains("dimension mismatch") => {
                return Err(SearchError::DependencyFatal(format!("{:#}", e)));
            }
            Err(e) => {
                failed_docs.extend(batch.iter().map(|(i, _)| *i));
                report
                    .errors
                    .push(format!("embedding batch failed: {:#}", e));
                return Ok(());
            }
        };

        let points: Vec<VectorPoint> = batch
            .iter()
            .zip(vectors)
            .map(|((doc_index, chunk), vector)| point_from(&documents[*doc_index], chunk, vector))
            .collect();
        let outcome = self.vector.upsert_chunks(collection, points).await;
        if outcome.failed > 0 {
            failed_docs.extend(batch.iter().map(|(i, _)| *i));
            report.errors.extend(outcome.errors);
        }
        Ok(())
    }
}

struct ConsumedFeed {
    documents: Vec<Document>,
    report: IndexReport,
}

fn point_from(document: &Document, chunk: &Chunk, vector: Vec<f32>) -> VectorPoint {
    VectorPoint {
        id: point_id(&chunk.id),
        vector,
        payload: ChunkPayload {
            document_id: document.id.clone(),
            chunk_id: chunk.id.clone(),
            ordinal: chunk.ordinal,
            title: document.title.clone(),
            content_type: document.content_type.clone(),
            published_ts: document.published_at.map(|d| d.timestamp()),
            author: document.author.clone(),
            categories: document.categories.iter().map(|t| t.slug.clone()).collect(),
            tags: document.tags.iter().map(|t| t.slug.clone()).collect(),
        },
    }
}

fn excerpt_of(document: &Document) -> String {
    if !document.excerpt.trim().is_empty() {
        return document.excerpt.clone();
    }
    let prefix: String = document.body.chars().take(200).collect();
    prefix
}

fn validate_request(request: &SearchRequest) -> Result<()> {
    let query_len = request.query.trim().chars().count();
    if !(QUERY_MIN_CHARS..=QUERY_MAX_CHARS).contains(&query_len) {
        return Err(SearchError::Validation(format!(
            "query length must be between {} and {} characters, got {}",
            QUERY_MIN_CHARS, QUERY_MAX_CHARS, query_len
        )));
    }
    if !(1..=LIMIT_MAX).contains(&request.limit) {
        return Err(SearchError::Validation(format!(
            "limit must be between 1 and {}, got {}",
            LIMIT_MAX, request.limit
        )));
    }
    if let Some(weight) = request.ai_weight {
        if !(0.0..=1.0).contains(&weight) {
            return Err(SearchError::Validation(format!(
                "ai_weight must be in [0.0, 1.0], got {}",
                weight
            )));
        }
    }
    Ok(())
}
