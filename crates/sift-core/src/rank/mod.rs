//! Fusion and final ranking: reciprocal rank fusion of the lexical and
//! semantic streams, hybrid scoring against the (possibly estimated) AI
//! relevance, and the single composite-key sort that fixes the response
//! order.

pub mod rerank;

use std::collections::HashMap;

use crate::types::{BoostFactors, Candidate, QueryIntent};

/// Reciprocal Rank Fusion over the two boosted streams. Component scores
/// are retained on each candidate for the ranking explanation. The result
/// is ordered deterministically (RRF descending, id ascending) so the
/// pre-rerank top-M cut is stable.
pub fn fuse(
    lexical: &[(String, f32)],
    semantic: &[(String, f32)],
    boosts: &HashMap<String, BoostFactors>,
    k: usize,
) -> Vec<Candidate> {
    let mut by_id: HashMap<String, Candidate> = HashMap::new();

    for (rank, (id, score)) in lexical.iter().enumerate() {
        let candidate = by_id
            .entry(id.clone())
            .or_insert_with(|| Candidate::new(id.clone()));
        candidate.lexical_score = Some(*score);
        candidate.rrf_score += 1.0 / (k as f32 + rank as f32 + 1.0);
    }
    for (rank, (id, score)) in semantic.iter().enumerate() {
        let candidate = by_id
            .entry(id.clone())
            .or_insert_with(|| Candidate::new(id.clone()));
        candidate.semantic_score = Some(*score);
        candidate.rrf_score += 1.0 / (k as f32 + rank as f32 + 1.0);
    }

    let mut candidates: Vec<Candidate> = by_id
        .into_values()
        .map(|mut candidate| {
            if let Some(factors) = boosts.get(&candidate.document_id) {
                candidate.boosts = *factors;
            }
            candidate
        })
        .collect();
    candidates.sort_unstable_by(|a, b| {
        b.rrf_score
            .partial_cmp(&a.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    candidates
}

/// Dynamic AI-weight adjustment. All applicable adjustments apply in
/// order; the result is clamped to [0.0, 1.0] afterwards so caller-supplied
/// extremes (0.0, 1.0) stay stable under multiplication.
pub fn dynamic_ai_weight(base: f32, query: &str, intent: QueryIntent) -> f32 {
    let trimmed = query.trim();
    let token_count = trimmed.split_whitespace().count();
    let quoted = trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2;

    let mut weight = base;
    if token_count <= 2 || quoted {
        weight *= 0.8;
    }
    if intent == QueryIntent::PersonName {
        weight = (weight * 1.15).min(0.9);
    }
    if token_count >= 6 || intent == QueryIntent::HowTo {
        weight = (weight * 1.1).min(0.85);
    }
    weight.clamp(0.0, 1.0)
}

/// Compute hybrid scores and order candidates with ONE composite key:
/// hybrid descending, then post-type priority index ascending, then
/// document id ascending.
pub fn score_and_sort(
    candidates: &mut [Candidate],
    ai_weight: f32,
    priority_of: impl Fn(&str) -> usize,
) {
    let lexical_weight = 1.0 - ai_weight;
    for candidate in candidates.iter_mut() {
        let lexical = candidate.lexical_score.unwrap_or(0.0);
        let ai = candidate.ai_score.unwrap_or(0.0) / 100.0;
        candidate.hybrid_score = lexical_weight * lexical + ai_weight * ai;
        candidate.priority_index = priority_of(&candidate.document_id);
    }
    candidates.sort_by(|a, b| {
        b.hybrid_score
            .partial_cmp(&a.hybrid_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.priority_index.cmp(&b.priority_index))
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(pairs: &[(&str, f32)]) -> Vec<(String, f32)> {
        pairs.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    #[test]
    fn fusion_sums_contributions_from_both_streams() {
        let lexical = stream(&[("a", 0.9), ("b", 0.5)]);
        let semantic = stream(&[("b", 0.8), ("c", 0.6)]);
        let fused = fuse(&lexical, &semantic, &HashMap::new(), 60);
        let b = fused.iter().find(|c| c.document_id == "b").unwrap();
        // b appears in both streams: 1/(60+2) + 1/(60+1).
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((b.rrf_score - expected).abs() < 1e-6);
        assert_eq!(b.lexical_score, Some(0.5));
        assert_eq!(b.semantic_score, Some(0.8));
        // b leads: it got contributions from both lists.
        assert_eq!(fused[0].document_id, "b");
    }

    #[test]
    fn fusion_is_deterministic_on_ties() {
        let lexical = stream(&[("b", 0.5), ("a", 0.5)]);
        let fused_one = fuse(&lexical, &[], &HashMap::new(), 60);
        let fused_two = fuse(&lexical, &[], &HashMap::new(), 60);
        let ids_one: Vec<_> = fused_one.iter().map(|c| &c.document_id).collect();
        let ids_two: Vec<_> = fused_two.iter().map(|c| &c.document_id).collect();
        assert_eq!(ids_one, ids_two);
    }

    #[test]
    fn short_query_lowers_ai_weight() {
        let weight = dynamic_ai_weight(0.7, "acme", QueryIntent::General);
        assert!((weight - 0.56).abs() < 1e-6);
    }

    #[test]
    fn person_name_raises_ai_weight_with_cap() {
        // Two tokens → ×0.8 first, then ×1.15.
        let weight = dynamic_ai_weight(0.7, "James Walsh", QueryIntent::PersonName);
        assert!((weight - 0.7 * 0.8 * 1.15).abs() < 1e-6);
        let capped = dynamic_ai_weight(0.95, "James Walsh Smith", QueryIntent::PersonName);
        assert!(capped <= 0.9);
    }

    #[test]
    fn long_or_howto_raises_ai_weight_with_cap() {
        let weight = dynamic_ai_weight(
            0.7,
            "how do I configure the pipeline for nightly runs",
            QueryIntent::HowTo,
        );
        assert!(weight <= 0.85);
        assert!(weight > 0.7);
    }

    #[test]
    fn extreme_weights_stay_clamped() {
        assert_eq!(dynamic_ai_weight(0.0, "hi", QueryIntent::General), 0.0);
        assert!(dynamic_ai_weight(1.0, "one two three four five six", QueryIntent::General) <= 1.0);
    }

    #[test]
    fn composite_sort_breaks_ties_by_priority_then_id() {
        let mut candidates = vec![
            {
                let mut c = Candidate::new("zeta".into());
                c.lexical_score = Some(0.5);
                c.ai_score = Some(50.0);
                c
            },
            {
                let mut c = Candidate::new("alpha".into());
                c.lexical_score = Some(0.5);
                c.ai_score = Some(50.0);
                c
            },
            {
                let mut c = Candidate::new("beta".into());
                c.lexical_score = Some(0.5);
                c.ai_score = Some(50.0);
                c
            },
        ];
        // zeta gets priority 0, the others share priority 1.
        score_and_sort(&mut candidates, 0.7, |id| if id == "zeta" { 0 } else { 1 });
        let ids: Vec<_> = candidates.iter().map(|c| c.document_id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn hybrid_score_weighs_lexical_and_ai() {
        let mut candidates = vec![{
            let mut c = Candidate::new("a".into());
            c.lexical_score = Some(0.6);
            c.ai_score = Some(80.0);
            c
        }];
        score_and_sort(&mut candidates, 0.7, |_| 0);
        let expected = 0.3 * 0.6 + 0.7 * 0.8;
        assert!((candidates[0].hybrid_score - expected).abs() < 1e-6);
    }
}
