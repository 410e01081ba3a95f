//! Application of LLM rerank judgements to the fused candidate list.
//!
//! The judge is only shown the top M candidates; everyone else (and every
//! candidate the judge failed to cover) gets an estimated AI score derived
//! from its retrieval score, flagged `score_estimated`. Judge scores that
//! bunch into a narrow band are spread over 60..100 so the hybrid score
//! retains discriminating power.

use std::collections::HashMap;

use crate::llm::AiJudgement;
use crate::types::Candidate;

const ESTIMATE_FACTOR: f32 = 0.9;
const NARROW_BAND: f32 = 20.0;

/// Estimated AI score for a candidate the judge did not cover:
/// retrieval score × 0.9, expressed on the 0..100 scale.
fn estimate(candidate: &Candidate) -> f32 {
    (candidate.estimation_base() * ESTIMATE_FACTOR * 100.0).clamp(0.0, 100.0)
}

/// Give every candidate an estimated score (reranking disabled or wholly
/// unavailable).
pub fn estimate_all(candidates: &mut [Candidate]) {
    for candidate in candidates.iter_mut() {
        candidate.ai_score = Some(estimate(candidate));
        candidate.score_estimated = true;
    }
}

/// Apply judge output to the candidate list. `judged_ids` is the set the
/// judge was shown (the top M). Duplicated ids keep their first judgement;
/// ids the judge invented are ignored, so the candidate set is exactly
/// preserved. Returns true if any candidate ended up with an estimated
/// score.
pub fn apply_judgements(
    candidates: &mut [Candidate],
    judgements: Vec<AiJudgement>,
    judged_ids: &std::collections::HashSet<String>,
) -> bool {
    let mut by_id: HashMap<String, AiJudgement> = HashMap::new();
    for judgement in judgements {
        by_id.entry(judgement.id.clone()).or_insert(judgement);
    }

    let normalized = normalize_band(
        by_id
            .values()
            .map(|j| (j.id.clone(), j.ai_score))
            .collect(),
    );

    let mut any_estimated = false;
    for candidate in candidates.iter_mut() {
        let judged = judged_ids.contains(&candidate.document_id);
        match normalized.get(&candidate.document_id) {
            Some(score) if judged => {
                candidate.ai_score = Some(*score);
                candidate.ai_reason = by_id
                    .get(&candidate.document_id)
                    .map(|j| j.reason.clone())
                    .filter(|r| !r.is_empty());
                candidate.score_estimated = false;
            }
            _ => {
                candidate.ai_score = Some(estimate(candidate));
                candidate.score_estimated = true;
                any_estimated = true;
            }
        }
    }
    any_estimated
}

/// Band normalization of judged scores.
///
/// - Range < 20: percentile-map onto 60..100 so near-uniform judgements
///   still produce an ordering the hybrid score can use.
/// - Otherwise: clamp each score into [0, 100]; a min-max rescale happens
///   only when scores fall outside that range.
fn normalize_band(scores: Vec<(String, f32)>) -> HashMap<String, f32> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let values: Vec<f32> = scores.iter().map(|(_, s)| *s).collect();
    let min = values.iter().copied().fold(f32::MAX, f32::min);
    let max = values.iter().copied().fold(f32::MIN, f32::max);
    let range = max - min;

    if scores.len() > 1 && range < NARROW_BAND {
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        return scores
            .into_iter()
            .map(|(id, score)| {
                let below = sorted.iter().filter(|v| **v < score).count();
                let percentile = below as f32 / (n - 1) as f32;
                (id, 60.0 + 40.0 * percentile)
            })
            .collect();
    }

    if min < 0.0 || max > 100.0 {
        // Out-of-contract scores: min-max rescale into [0, 100].
        let span = range.max(1e-6);
        return scores
            .into_iter()
            .map(|(id, score)| (id, (score - min) / span * 100.0))
            .collect();
    }

    scores.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn candidate(id: &str, lexical: Option<f32>, semantic: Option<f32>) -> Candidate {
        let mut c = Candidate::new(id.into());
        c.lexical_score = lexical;
        c.semantic_score = semantic;
        c
    }

    fn judgement(id: &str, score: f32) -> AiJudgement {
        AiJudgement {
            id: id.into(),
            ai_score: score,
            reason: format!("reason for {}", id),
        }
    }

    #[test]
    fn judged_candidates_get_scores_others_get_estimates() {
        let mut candidates = vec![
            candidate("a", Some(0.8), None),
            candidate("b", Some(0.5), None),
            candidate("c", Some(0.4), None),
        ];
        let judged: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let any_estimated = apply_judgements(
            &mut candidates,
            vec![judgement("a", 90.0), judgement("b", 30.0)],
            &judged,
        );
        assert!(any_estimated);
        assert_eq!(candidates[0].ai_score, Some(90.0));
        assert!(!candidates[0].score_estimated);
        assert_eq!(candidates[1].ai_score, Some(30.0));
        // c was never shown to the judge: lexical 0.4 × 0.9 × 100.
        assert!((candidates[2].ai_score.unwrap() - 36.0).abs() < 1e-4);
        assert!(candidates[2].score_estimated);
    }

    #[test]
    fn candidate_set_is_preserved_despite_judge_noise() {
        let mut candidates = vec![candidate("a", Some(0.8), None)];
        let judged: HashSet<String> = ["a".to_string()].into_iter().collect();
        apply_judgements(
            &mut candidates,
            vec![
                judgement("a", 70.0),
                judgement("a", 10.0),      // duplicate: first wins
                judgement("invented", 99.0), // unknown id: ignored
            ],
            &judged,
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].ai_score, Some(70.0));
    }

    #[test]
    fn missing_coverage_estimates_from_lexical() {
        let mut candidates = vec![
            candidate("a", Some(0.8), None),
            candidate("b", Some(0.6), None),
        ];
        let judged: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        // Judge only returned a: b must still get a score.
        apply_judgements(&mut candidates, vec![judgement("a", 88.0)], &judged);
        assert!(candidates[1].score_estimated);
        assert!((candidates[1].ai_score.unwrap() - 54.0).abs() < 1e-4);
    }

    #[test]
    fn semantic_only_candidates_estimate_from_semantic() {
        let mut candidates = vec![candidate("a", None, Some(0.7))];
        estimate_all(&mut candidates);
        assert!((candidates[0].ai_score.unwrap() - 63.0).abs() < 1e-4);
    }

    #[test]
    fn narrow_band_spreads_to_sixty_hundred() {
        let normalized = normalize_band(vec![
            ("a".into(), 75.0),
            ("b".into(), 70.0),
            ("c".into(), 80.0),
        ]);
        assert_eq!(normalized["b"], 60.0);
        assert_eq!(normalized["a"], 80.0);
        assert_eq!(normalized["c"], 100.0);
    }

    #[test]
    fn wide_band_is_left_alone() {
        let normalized = normalize_band(vec![("a".into(), 95.0), ("b".into(), 20.0)]);
        assert_eq!(normalized["a"], 95.0);
        assert_eq!(normalized["b"], 20.0);
    }

    #[test]
    fn out_of_range_scores_are_rescaled() {
        let normalized = normalize_band(vec![("a".into(), 140.0), ("b".into(), 20.0)]);
        assert!((normalized["a"] - 100.0).abs() < 1e-4);
        assert!((normalized["b"] - 0.0).abs() < 1e-4);
    }
}
