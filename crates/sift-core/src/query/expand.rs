//! Query expansion: the original query plus up to two variants from a
//! deterministic synonym dictionary, optionally enriched by LLM-generated
//! rephrasings. Expansion is skipped for queries where variants would only
//! add noise (single tokens, quoted phrases, very short strings).

/// Domain synonym pairs: the first synonym not already present in the query
/// replaces the matched term, producing one variant per matched term.
const SYNONYM_PAIRS: &[(&str, &str)] = &[
    ("services", "solutions offerings"),
    ("service", "solution offering"),
    ("solutions", "services offerings"),
    ("consulting", "advisory"),
    ("support", "help assistance"),
    ("team", "staff people"),
    ("staff", "team employees"),
    ("contact", "reach connect"),
    ("careers", "jobs openings"),
    ("jobs", "careers positions"),
    ("location", "office address"),
    ("locations", "offices addresses"),
    ("price", "cost pricing"),
    ("pricing", "price cost"),
    ("buy", "purchase order"),
    ("guide", "tutorial instructions"),
    ("tutorial", "guide walkthrough"),
    ("leadership", "executives management"),
    ("executive", "leader officer"),
];

pub struct QueryExpander {
    max_variants: usize,
}

impl QueryExpander {
    pub fn new(max_variants: usize) -> Self {
        Self {
            max_variants: max_variants.max(1),
        }
    }

    /// Expansion is pointless for exact lookups and too risky for fragments.
    pub fn should_skip(&self, query: &str) -> bool {
        let trimmed = query.trim();
        trimmed.chars().count() < 5
            || trimmed.split_whitespace().count() <= 1
            || is_quoted_phrase(trimmed)
    }

    /// Variant 0 is always the original query, verbatim.
    pub fn expand_deterministic(&self, query: &str) -> Vec<String> {
        let mut variants = vec![query.to_string()];
        if self.should_skip(query) {
            return variants;
        }

        let lower = query.to_lowercase();
        for (term, synonyms) in SYNONYM_PAIRS {
            if !contains_word(&lower, term) {
                continue;
            }
            if let Some(synonym) = synonyms
                .split_whitespace()
                .find(|s| !contains_word(&lower, s))
            {
                variants.push(lower.replacen(term, synonym, 1));
            }
        }

        self.dedup_and_cap(variants)
    }

    /// Fold LLM-proposed rephrasings (one query per line) into the variant
    /// list, preserving order and the cap.
    pub fn merge_llm_variants(&self, variants: Vec<String>, llm_lines: Vec<String>) -> Vec<String> {
        let mut merged = variants;
        for line in llm_lines {
            let candidate = line.trim().trim_matches('"').to_string();
            if !candidate.is_empty() {
                merged.push(candidate);
            }
        }
        self.dedup_and_cap(merged)
    }

    fn dedup_and_cap(&self, variants: Vec<String>) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<String> = variants
            .into_iter()
            .filter(|v| {
                let key = v.to_lowercase().trim().to_string();
                !key.is_empty() && seen.insert(key)
            })
            .collect();
        out.truncate(self.max_variants);
        out
    }
}

fn is_quoted_phrase(query: &str) -> bool {
    (query.starts_with('"') && query.ends_with('"') && query.len() >= 2)
        || (query.starts_with('\'') && query.ends_with('\'') && query.len() >= 2)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_is_always_variant_zero() {
        let expander = QueryExpander::new(3);
        let variants = expander.expand_deterministic("consulting services for manufacturers");
        assert_eq!(variants[0], "consulting services for manufacturers");
    }

    #[test]
    fn skips_single_tokens_quotes_and_short_queries() {
        let expander = QueryExpander::new(3);
        assert!(expander.should_skip("hello"));
        assert!(expander.should_skip("\"exact phrase match\""));
        assert!(expander.should_skip("ab c"));
        assert!(!expander.should_skip("two words"));
    }

    #[test]
    fn synonym_expansion_produces_variants() {
        let expander = QueryExpander::new(3);
        let variants = expander.expand_deterministic("engineering consulting services");
        assert!(variants.len() > 1);
        assert!(variants.iter().any(|v| v.contains("advisory") || v.contains("solutions")));
    }

    #[test]
    fn variants_are_capped_and_deduplicated() {
        let expander = QueryExpander::new(3);
        let variants = expander.merge_llm_variants(
            vec!["alpha query".into(), "beta query".into()],
            vec![
                "Alpha Query".into(),
                "gamma query".into(),
                "delta query".into(),
            ],
        );
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0], "alpha query");
        assert_eq!(variants[1], "beta query");
        assert_eq!(variants[2], "gamma query");
    }

    #[test]
    fn quoted_llm_lines_are_unquoted() {
        let expander = QueryExpander::new(3);
        let variants =
            expander.merge_llm_variants(vec!["base".into()], vec!["\"quoted variant\"".into()]);
        assert!(variants.contains(&"quoted variant".to_string()));
    }
}
