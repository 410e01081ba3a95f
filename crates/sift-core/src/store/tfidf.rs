//! In-memory sparse TF-IDF matrix over the corpus.
//!
//! Vocabulary is fit on full reindex (unigrams + bigrams, lowercased,
//! English stopwords removed, at most `max_features` terms) and frozen
//! until the next full fit; incremental upserts vectorize against the
//! existing vocabulary only. Rows are L2-normalized so cosine similarity
//! is a sparse dot product in [0, 1].

use std::collections::HashMap;

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "you", "your", "yours",
];

fn is_stopword(token: &str) -> bool {
    ENGLISH_STOPWORDS.binary_search(&token).is_ok()
}

/// Lowercased alphanumeric tokens, stopwords removed.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !is_stopword(t))
        .map(|t| t.to_string())
        .collect()
}

/// Unigrams plus bigrams (joined with a single space).
fn ngrams(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms = Vec::with_capacity(tokens.len() * 2);
    for window in tokens.windows(2) {
        terms.push(format!("{} {}", window[0], window[1]));
    }
    terms.extend(tokens);
    terms
}

/// Sorted-by-column sparse vector.
#[derive(Debug, Clone, Default)]
pub struct SparseVec {
    entries: Vec<(u32, f32)>,
}

impl SparseVec {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn dot(&self, other: &SparseVec) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            match self.entries[i].0.cmp(&other.entries[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.entries[i].1 * other.entries[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    fn l2_normalize(mut self) -> Self {
        let norm: f32 = self.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for entry in &mut self.entries {
                entry.1 /= norm;
            }
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct TfidfMatrix {
    vocab: HashMap<String, u32>,
    idf: Vec<f32>,
    rows: Vec<SparseVec>,
    doc_ids: Vec<String>,
    row_index: HashMap<String, usize>,
}

impl TfidfMatrix {
    pub fn empty() -> Self {
        Self {
            vocab: HashMap::new(),
            idf: Vec::new(),
            rows: Vec::new(),
            doc_ids: Vec::new(),
            row_index: HashMap::new(),
        }
    }

    /// Fit vocabulary and rows from scratch. Terms are ranked by document
    /// frequency (ties broken lexicographically) and capped at
    /// `max_features`.
    pub fn fit<'a, I>(documents: I, max_features: usize) -> Self
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let prepared: Vec<(String, Vec<String>)> = documents
            .into_iter()
            .map(|(id, text)| (id.to_string(), ngrams(&text)))
            .collect();

        let mut document_frequency: HashMap<&str, u32> = HashMap::new();
        for (_, terms) in &prepared {
            let mut seen: Vec<&str> = terms.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, u32)> = document_frequency.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);

        let mut vocab = HashMap::with_capacity(ranked.len());
        let n_docs = prepared.len() as f32;
        let mut idf = Vec::with_capacity(ranked.len());
        for (col, (term, df)) in ranked.into_iter().enumerate() {
            vocab.insert(term.to_string(), col as u32);
            idf.push(((1.0 + n_docs) / (1.0 + df as f32)).ln() + 1.0);
        }

        let mut matrix = Self {
            vocab,
            idf,
            rows: Vec::with_capacity(prepared.len()),
            doc_ids: Vec::with_capacity(prepared.len()),
            row_index: HashMap::with_capacity(prepared.len()),
        };
        for (id, terms) in prepared {
            let row = matrix.vectorize_terms(&terms);
            matrix.row_index.insert(id.clone(), matrix.rows.len());
            matrix.doc_ids.push(id);
            matrix.rows.push(row);
        }
        matrix
    }

    /// Copy-on-write upsert against the frozen vocabulary: existing rows are
    /// replaced in place (stable row order), new documents append.
    pub fn with_upserted(&self, documents: &[(String, String)]) -> Self {
        let mut next = self.clone();
        for (id, text) in documents {
            let row = next.transform(text);
            match next.row_index.get(id) {
                Some(&i) => next.rows[i] = row,
                None => {
                    next.row_index.insert(id.clone(), next.rows.len());
                    next.doc_ids.push(id.clone());
                    next.rows.push(row);
                }
            }
        }
        next
    }

    /// Vectorize a text against the frozen vocabulary. Unknown terms are
    /// dropped; a query with no known terms yields an empty vector.
    pub fn transform(&self, text: &str) -> SparseVec {
        self.vectorize_terms(&ngrams(text))
    }

    fn vectorize_terms(&self, terms: &[String]) -> SparseVec {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for term in terms {
            if let Some(&col) = self.vocab.get(term) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }
        let mut entries: Vec<(u32, f32)> = counts
            .into_iter()
            .map(|(col, count)| {
                // Sublinear term frequency.
                let tf = 1.0 + (count as f32).ln();
                (col, tf * self.idf[col as usize])
            })
            .collect();
        entries.sort_unstable_by_key(|(col, _)| *col);
        SparseVec { entries }.l2_normalize()
    }

    /// Cosine scores for one query, best first, ties broken by document id
    /// ascending. An empty or all-unknown query returns no results.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f32)> {
        let query_vec = self.transform(query);
        if query_vec.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(String, f32)> = self
            .rows
            .iter()
            .zip(self.doc_ids.iter())
            .filter_map(|(row, id)| {
                let score = query_vec.dot(row);
                (score > 0.0).then(|| (id.clone(), score.clamp(0.0, 1.0)))
            })
            .collect();
        scored.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(limit);
        scored
    }

    pub fn document_count(&self) -> usize {
        self.rows.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocab.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(docs: &[(&str, &str)]) -> TfidfMatrix {
        TfidfMatrix::fit(
            docs.iter().map(|(id, text)| (*id, text.to_string())),
            10_000,
        )
    }

    #[test]
    fn stopwords_are_sorted_for_binary_search() {
        let mut sorted = ENGLISH_STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, ENGLISH_STOPWORDS);
    }

    #[test]
    fn tokenize_lowercases_and_drops_stopwords() {
        let tokens = tokenize("The Quick BROWN fox and the dog");
        assert_eq!(tokens, vec!["quick", "brown", "fox", "dog"]);
    }

    #[test]
    fn ngrams_include_bigrams() {
        let terms = ngrams("vector search engine");
        assert!(terms.contains(&"vector search".to_string()));
        assert!(terms.contains(&"search engine".to_string()));
        assert!(terms.contains(&"vector".to_string()));
    }

    #[test]
    fn matching_document_scores_highest() {
        let matrix = fit(&[
            ("a", "rust systems programming language"),
            ("b", "gardening tips for spring flowers"),
            ("c", "programming language design"),
        ]);
        let results = matrix.search("rust programming", 10);
        assert_eq!(results[0].0, "a");
        assert!(results[0].1 > 0.0 && results[0].1 <= 1.0);
    }

    #[test]
    fn unknown_query_returns_empty_not_error() {
        let matrix = fit(&[("a", "alpha beta gamma")]);
        assert!(matrix.search("zzz qqq", 10).is_empty());
        assert!(matrix.search("", 10).is_empty());
    }

    #[test]
    fn ties_break_by_document_id_ascending() {
        let matrix = fit(&[("b", "identical text"), ("a", "identical text")]);
        let results = matrix.search("identical text", 10);
        assert_eq!(results.len(), 2);
        assert!((results[0].1 - results[1].1).abs() < 1e-6);
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "b");
    }

    #[test]
    fn vocabulary_is_capped() {
        let matrix = TfidfMatrix::fit(
            [("a", "one two three four five six seven".to_string())],
            3,
        );
        assert_eq!(matrix.vocabulary_size(), 3);
    }

    #[test]
    fn upsert_replaces_in_place_and_appends() {
        let matrix = fit(&[("a", "old text about cats"), ("b", "dogs bark loudly")]);
        let updated = matrix.with_upserted(&[
            ("a".to_string(), "dogs bark loudly".to_string()),
            ("c".to_string(), "dogs bark loudly".to_string()),
        ]);
        assert_eq!(updated.document_count(), 3);
        // Row order is stable: a kept its slot.
        let results = updated.search("dogs bark", 10);
        assert_eq!(results.len(), 3);
        // Frozen vocabulary: original is untouched.
        assert_eq!(matrix.document_count(), 2);
    }

    #[test]
    fn frozen_vocabulary_ignores_new_terms() {
        let matrix = fit(&[("a", "alpha beta")]);
        let updated = matrix.with_upserted(&[("b".to_string(), "zeta omega".to_string())]);
        // "zeta" was never in the vocabulary, so the new row is empty and
        // unmatchable until a full refit.
        assert!(updated.search("zeta", 10).is_empty());
    }

    #[test]
    fn upsert_is_idempotent() {
        let matrix = fit(&[("a", "stable text")]);
        let once = matrix.with_upserted(&[("a".to_string(), "stable text".to_string())]);
        let twice = once.with_upserted(&[("a".to_string(), "stable text".to_string())]);
        let a = once.search("stable text", 10);
        let b = twice.search("stable text", 10);
        assert_eq!(a.len(), b.len());
        assert!((a[0].1 - b[0].1).abs() < 1e-6);
    }
}
