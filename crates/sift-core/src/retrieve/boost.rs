//! Candidate boosting: field-match, freshness, and taxonomy-overlap
//! multipliers applied to raw retrieval scores.
//!
//! Caps are part of the contract: field ≤ 2.0×, taxonomy ≤ 1.5×,
//! freshness ∈ {1.0, 1.1, 1.2, 1.5}.

use chrono::{DateTime, Utc};

use crate::types::{BoostFactors, Document, Term};

const MIN_TOKEN_LEN: usize = 3;

pub fn compute_boosts(query: &str, doc: &Document, now: DateTime<Utc>) -> BoostFactors {
    BoostFactors {
        field: field_boost(query, doc),
        freshness: freshness_boost(doc.published_at, now),
        taxonomy: taxonomy_boost(query, doc),
    }
}

/// Query tokens used for matching; tokens shorter than three characters
/// carry no signal and are ignored.
fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

fn text_tokens(text: &str) -> std::collections::HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Field-score boost. Bonuses accumulate (an exact title match also counts
/// as all-tokens and any-token), then the multiplier is capped at 2.0.
pub fn field_boost(query: &str, doc: &Document) -> f32 {
    let phrase = query.trim().to_lowercase();
    let tokens = query_tokens(query);
    if phrase.is_empty() || tokens.is_empty() {
        return 1.0;
    }

    let title = doc.title.to_lowercase();
    let excerpt = doc.excerpt.to_lowercase();
    let body = doc.body.to_lowercase();
    let title_tokens = text_tokens(&title);
    let excerpt_tokens = text_tokens(&excerpt);
    let body_tokens = text_tokens(&body);

    let mut bonus = 0.0f32;
    if title.contains(&phrase) {
        bonus += 3.0;
    }
    if tokens.iter().all(|t| title_tokens.contains(t)) {
        bonus += 2.0;
    }
    if tokens.iter().any(|t| title_tokens.contains(t)) {
        bonus += 1.0;
    }
    if !excerpt.is_empty() && excerpt.contains(&phrase) {
        bonus += 1.5;
    }
    if tokens.iter().any(|t| excerpt_tokens.contains(t)) {
        bonus += 0.5;
    }
    if tokens.iter().any(|t| body_tokens.contains(t)) {
        bonus += 0.2;
    }

    (1.0 + bonus).min(2.0)
}

/// Freshness ladder; missing or future-dated publication dates get no boost.
pub fn freshness_boost(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    let Some(published) = published else {
        return 1.0;
    };
    let age_days = (now - published).num_days();
    if age_days < 0 {
        return 1.0;
    }
    if age_days < 30 {
        1.5
    } else if age_days < 90 {
        1.2
    } else if age_days < 365 {
        1.1
    } else {
        1.0
    }
}

/// Taxonomy overlap. Additive bonus capped at 0.5 before converting to a
/// multiplier, so the multiplier never exceeds 1.5.
pub fn taxonomy_boost(query: &str, doc: &Document) -> f32 {
    let phrase = query.trim().to_lowercase();
    let tokens = query_tokens(query);
    if phrase.is_empty() {
        return 1.0;
    }

    let mut bonus = 0.0f32;
    if exact_term_match(&phrase, &doc.categories) {
        bonus += 0.3;
    } else if token_term_overlap(&tokens, &doc.categories) {
        bonus += 0.15;
    }
    if exact_term_match(&phrase, &doc.tags) {
        bonus += 0.2;
    } else if token_term_overlap(&tokens, &doc.tags) {
        bonus += 0.1;
    }

    1.0 + bonus.min(0.5)
}

fn exact_term_match(phrase: &str, terms: &[Term]) -> bool {
    terms
        .iter()
        .any(|t| t.name.to_lowercase() == phrase || t.slug.to_lowercase() == phrase)
}

fn token_term_overlap(tokens: &[String], terms: &[Term]) -> bool {
    terms.iter().any(|t| {
        let term_tokens = text_tokens(&t.name);
        tokens.iter().any(|q| term_tokens.contains(q))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc(title: &str, excerpt: &str, body: &str) -> Document {
        Document {
            id: "d".into(),
            title: title.into(),
            body: body.into(),
            excerpt: excerpt.into(),
            content_type: "post".into(),
            url: String::new(),
            published_at: None,
            author: String::new(),
            categories: vec![],
            tags: vec![],
            featured_image: None,
            word_count: 0,
        }
    }

    #[test]
    fn exact_title_match_hits_the_cap() {
        let d = doc("James Walsh", "", "");
        // +3 (phrase) +2 (all tokens) +1 (any token) = 6, capped to 2.0×.
        assert_eq!(field_boost("James Walsh", &d), 2.0);
    }

    #[test]
    fn partial_title_match_boosts_below_cap() {
        let d = doc("Walsh annual review", "", "");
        // any-token only: 1 + 1.0 = 2.0? No: "james" missing so all-tokens
        // fails; any-token +1.0 → 2.0 exactly.
        assert_eq!(field_boost("James Walsh", &d), 2.0);
        let d2 = doc("Quarterly report", "", "mentions walsh once");
        // body-only match: 1 + 0.2.
        assert!((field_boost("James Walsh", &d2) - 1.2).abs() < 1e-6);
    }

    #[test]
    fn short_tokens_are_ignored() {
        let d = doc("An ox", "", "");
        // "ox" and "an" are under three characters; no boost applies.
        assert_eq!(field_boost("an ox", &d), 1.0);
    }

    #[test]
    fn freshness_ladder_values() {
        let now = Utc::now();
        assert_eq!(freshness_boost(Some(now - Duration::days(10)), now), 1.5);
        assert_eq!(freshness_boost(Some(now - Duration::days(60)), now), 1.2);
        assert_eq!(freshness_boost(Some(now - Duration::days(200)), now), 1.1);
        assert_eq!(freshness_boost(Some(now - Duration::days(1000)), now), 1.0);
        assert_eq!(freshness_boost(None, now), 1.0);
    }

    #[test]
    fn taxonomy_boost_caps_at_one_point_five() {
        let mut d = doc("t", "", "");
        d.categories = vec![Term {
            slug: "industrial-coatings".into(),
            name: "industrial coatings".into(),
        }];
        d.tags = vec![Term {
            slug: "industrial-coatings".into(),
            name: "industrial coatings".into(),
        }];
        let boost = taxonomy_boost("industrial coatings", &d);
        // 0.3 (category exact) + 0.2 (tag exact) = 0.5 → 1.5×.
        assert!((boost - 1.5).abs() < 1e-6);
    }

    #[test]
    fn taxonomy_token_overlap_is_weaker_than_exact() {
        let mut d = doc("t", "", "");
        d.categories = vec![Term {
            slug: "coatings-news".into(),
            name: "Coatings News".into(),
        }];
        let boost = taxonomy_boost("industrial coatings", &d);
        assert!((boost - 1.15).abs() < 1e-6);
    }

    #[test]
    fn boosts_compose_within_caps() {
        let now = Utc::now();
        let mut d = doc("Exact Phrase", "exact phrase", "exact phrase body");
        d.published_at = Some(now - Duration::days(5));
        let factors = compute_boosts("Exact Phrase", &d, now);
        assert!(factors.field <= 2.0);
        assert!(factors.taxonomy <= 1.5);
        assert_eq!(factors.freshness, 1.5);
        assert!(factors.multiplier() <= 2.0 * 1.5 * 1.5);
    }
}
