//! In-memory corpus: documents plus the derived TF-IDF matrix.
//!
//! Single-writer/many-reader discipline: mutations happen only through
//! `upsert_documents`, `delete_document`, and `replace_all`; readers take a
//! `CorpusSnapshot` that stays consistent for the life of a request. Both
//! the document map and the matrix are swapped as `Arc`s, so a full reindex
//! is atomic from any reader's perspective.

pub mod tfidf;

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::Document;
use tfidf::TfidfMatrix;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub vocabulary_size: usize,
}

/// An immutable view of the corpus at one point in time.
#[derive(Clone)]
pub struct CorpusSnapshot {
    docs: Arc<HashMap<String, Arc<Document>>>,
    matrix: Arc<TfidfMatrix>,
}

impl CorpusSnapshot {
    fn empty() -> Self {
        Self {
            docs: Arc::new(HashMap::new()),
            matrix: Arc::new(TfidfMatrix::empty()),
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Document>> {
        self.docs.get(id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.docs.values()
    }

    /// Lexical search over the snapshot. Each query is scored separately
    /// (up to `limit` hits per query); hits are merged across queries
    /// keeping the maximum score per document. Deleted documents may still
    /// have stale matrix rows until the next full rebuild, so results are
    /// filtered against the live document map.
    pub fn tfidf_search(&self, queries: &[String], limit: usize) -> Vec<(String, f32)> {
        let mut merged: HashMap<String, f32> = HashMap::new();
        for query in queries {
            for (id, score) in self.matrix.search(query, limit) {
                if !self.docs.contains_key(&id) {
                    continue;
                }
                merged
                    .entry(id)
                    .and_modify(|best| *best = best.max(score))
                    .or_insert(score);
            }
        }
        let mut results: Vec<(String, f32)> = merged.into_iter().collect();
        results.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(limit);
        results
    }
}

pub struct DocumentStore {
    current: RwLock<CorpusSnapshot>,
    max_features: usize,
}

impl DocumentStore {
    pub fn new(max_features: usize) -> Self {
        Self {
            current: RwLock::new(CorpusSnapshot::empty()),
            max_features,
        }
    }

    pub fn snapshot(&self) -> CorpusSnapshot {
        self.current.read().clone()
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Document>> {
        self.current.read().lookup(id)
    }

    pub fn stats(&self) -> StoreStats {
        let snapshot = self.current.read();
        StoreStats {
            documents: snapshot.docs.len(),
            vocabulary_size: snapshot.matrix.vocabulary_size(),
        }
    }

    /// Incremental upsert. The TF-IDF vocabulary stays frozen; new rows are
    /// vectorized against it. An empty store bootstraps its vocabulary from
    /// the first batch (there is nothing to freeze yet).
    pub fn upsert_documents(&self, documents: Vec<Document>) -> UpsertCounts {
        if documents.is_empty() {
            return UpsertCounts::default();
        }

        let mut guard = self.current.write();
        let mut docs = (*guard.docs).clone();
        let mut counts = UpsertCounts::default();
        let rows: Vec<(String, String)> = documents
            .iter()
            .map(|d| (d.id.clone(), d.searchable_text()))
            .collect();

        for doc in documents {
            if docs.insert(doc.id.clone(), Arc::new(doc)).is_some() {
                counts.updated += 1;
            } else {
                counts.inserted += 1;
            }
        }

        let matrix = if guard.matrix.vocabulary_size() == 0 {
            TfidfMatrix::fit(
                docs.values().map(|d| (d.id.as_str(), d.searchable_text())),
                self.max_features,
            )
        } else {
            guard.matrix.with_upserted(&rows)
        };

        *guard = CorpusSnapshot {
            docs: Arc::new(docs),
            matrix: Arc::new(matrix),
        };
        counts
    }

    /// Tombstone a document. Its matrix row survives until the next full
    /// rebuild but is filtered out of every search. Returns whether the
    /// document existed.
    pub fn delete_document(&self, id: &str) -> bool {
        let mut guard = self.current.write();
        if !guard.docs.contains_key(id) {
            return false;
        }
        let mut docs = (*guard.docs).clone();
        docs.remove(id);
        *guard = CorpusSnapshot {
            docs: Arc::new(docs),
            matrix: guard.matrix.clone(),
        };
        true
    }

    /// Full rebuild: refit the vocabulary and swap the whole snapshot in
    /// one store. In-flight readers keep the snapshot they started with.
    pub fn replace_all(&self, documents: Vec<Document>) {
        let docs: HashMap<String, Arc<Document>> = documents
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();
        let matrix = TfidfMatrix::fit(
            docs.values().map(|d| (d.id.as_str(), d.searchable_text())),
            self.max_features,
        );
        let snapshot = CorpusSnapshot {
            docs: Arc::new(docs),
            matrix: Arc::new(matrix),
        };
        *self.current.write() = snapshot;
    }
}
