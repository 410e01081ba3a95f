//! Dual retrieval: for every query variant, lexical (TF-IDF) and semantic
//! (embedding + vector DB) searches run concurrently; variants fan out with
//! a bounded width. Boosts are applied per variant and the maximum boosted
//! score per document is kept within each stream.

pub mod boost;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;

use crate::context::RequestContext;
use crate::embedding::Embedder;
use crate::store::CorpusSnapshot;
use crate::types::{BoostFactors, SearchFilters};
use crate::vector::VectorIndex;

/// Boosted per-stream scores keyed by document id, plus the boost factors
/// that produced each document's best score (for explanations).
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    pub lexical: Vec<(String, f32)>,
    pub semantic: Vec<(String, f32)>,
    pub boosts: HashMap<String, BoostFactors>,
    pub semantic_available: bool,
}

pub struct Retriever<'a> {
    pub snapshot: &'a CorpusSnapshot,
    pub vector: &'a VectorIndex,
    pub embedder: &'a Embedder,
    pub limit: usize,
    pub concurrency: usize,
}

struct VariantResult {
    lexical: Vec<(String, f32, BoostFactors)>,
    semantic: Vec<(String, f32, BoostFactors)>,
    semantic_failed: bool,
}

impl<'a> Retriever<'a> {
    pub async fn run(
        &self,
        ctx: &RequestContext,
        variants: &[String],
        filters: Option<&SearchFilters>,
    ) -> RetrievalOutcome {
        let per_variant: Vec<VariantResult> = stream::iter(variants.to_vec())
            .map(|variant: String| async move { self.run_variant(ctx, &variant, filters).await })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        let mut outcome = RetrievalOutcome {
            semantic_available: true,
            ..RetrievalOutcome::default()
        };
        let mut lexical_best: HashMap<String, (f32, BoostFactors)> = HashMap::new();
        let mut semantic_best: HashMap<String, (f32, BoostFactors)> = HashMap::new();

        let mut any_semantic_failure = false;
        for result in per_variant {
            any_semantic_failure |= result.semantic_failed;
            for (id, score, factors) in result.lexical {
                merge_max(&mut lexical_best, id, score, factors);
            }
            for (id, score, factors) in result.semantic {
                merge_max(&mut semantic_best, id, score, factors);
            }
        }
        if any_semantic_failure {
            outcome.semantic_available = false;
            ctx.record_degradation("vector search unavailable, lexical-only retrieval");
        }

        // The boost trace keeps whichever stream scored the document higher.
        for (id, (score, factors)) in lexical_best.iter() {
            let semantic = semantic_best.get(id).map(|(s, _)| *s).unwrap_or(f32::MIN);
            if *score >= semantic {
                outcome.boosts.insert(id.clone(), *factors);
            }
        }
        for (id, (score, factors)) in semantic_best.iter() {
            let lexical = lexical_best.get(id).map(|(s, _)| *s).unwrap_or(f32::MIN);
            if *score > lexical {
                outcome.boosts.insert(id.clone(), *factors);
            }
        }

        outcome.lexical = finalize_stream(lexical_best, self.limit);
        outcome.semantic = finalize_stream(semantic_best, self.limit);
        outcome
    }

    async fn run_variant(
        &self,
        ctx: &RequestContext,
        variant: &str,
        filters: Option<&SearchFilters>,
    ) -> VariantResult {
        let (lexical, semantic) = tokio::join!(
            self.lexical_search(variant, filters),
            self.semantic_search(ctx, variant, filters)
        );
        let (semantic_hits, semantic_failed) = semantic;
        VariantResult {
            lexical,
            semantic: semantic_hits,
            semantic_failed,
        }
    }

    async fn lexical_search(
        &self,
        variant: &str,
        filters: Option<&SearchFilters>,
    ) -> Vec<(String, f32, BoostFactors)> {
        let now = Utc::now();
        self.snapshot
            .tfidf_search(std::slice::from_ref(&variant.to_string()), self.limit)
            .into_iter()
            .filter_map(|(id, score)| {
                let doc = self.snapshot.lookup(&id)?;
                if let Some(filters) = filters {
                    if !filters.matches(&doc) {
                        return None;
                    }
                }
                let factors = boost::compute_boosts(variant, &doc, now);
                Some((id, score * factors.multiplier(), factors))
            })
            .collect()
    }

    /// Returns (hits, failed). An all-zero embedding skips the semantic
    /// path silently; a backend failure flags degradation.
    async fn semantic_search(
        &self,
        ctx: &RequestContext,
        variant: &str,
        filters: Option<&SearchFilters>,
    ) -> (Vec<(String, f32, BoostFactors)>, bool) {
        let vector = match self.embedder.embed_query(variant).await {
            Ok(Some(vector)) => vector,
            Ok(None) => return (Vec::new(), false),
            Err(e) => {
                ctx.record_degradation(format!("query embedding failed: {:#}", e));
                return (Vec::new(), true);
            }
        };

        let hits = match self.vector.semantic_search(&vector, self.limit, filters).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "semantic search failed");
                return (Vec::new(), true);
            }
        };

        let now = Utc::now();
        let boosted = hits
            .into_iter()
            .filter_map(|hit| {
                // Results must resolve against the live corpus; stale vector
                // payloads for deleted documents are dropped here.
                let doc = self.snapshot.lookup(&hit.document_id)?;
                if let Some(filters) = filters {
                    if !filters.matches(&doc) {
                        return None;
                    }
                }
                let factors = boost::compute_boosts(variant, &doc, now);
                Some((hit.document_id, hit.score * factors.multiplier(), factors))
            })
            .collect();
        (boosted, false)
    }
}

fn merge_max(
    best: &mut HashMap<String, (f32, BoostFactors)>,
    id: String,
    score: f32,
    factors: BoostFactors,
) {
    best.entry(id)
        .and_modify(|(s, f)| {
            if score > *s {
                *s = score;
                *f = factors;
            }
        })
        .or_insert((score, factors));
}

fn finalize_stream(
    best: HashMap<String, (f32, BoostFactors)>,
    limit: usize,
) -> Vec<(String, f32)> {
    let mut stream: Vec<(String, f32)> = best
        .into_iter()
        .map(|(id, (score, _))| (id, score))
        .collect();
    stream.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    stream.truncate(limit);
    stream
}
