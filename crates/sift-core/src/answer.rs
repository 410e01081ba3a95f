//! Strict-mode extractive answer synthesis from the top results. The model
//! is constrained to facts present in the supplied excerpts; this module
//! wires the call and resolves `Source k` citations back to document ids.

use regex::Regex;
use std::sync::LazyLock;

use crate::context::RequestContext;
use crate::llm::LlmClient;
use crate::types::Answer;

static SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ss]ource\s+(\d+)").expect("source citation regex is valid"));

#[derive(Debug, Clone)]
pub struct AnswerSource {
    pub id: String,
    pub title: String,
    pub excerpt: String,
}

/// Generate an answer from the top-N sources. Returns `None` when the LLM
/// is unavailable or produced nothing; the caller treats that as a
/// degradation, not an error.
pub async fn synthesize(
    llm: &LlmClient,
    ctx: &RequestContext,
    query: &str,
    sources: &[AnswerSource],
) -> Option<Answer> {
    if sources.is_empty() {
        return None;
    }
    let pairs: Vec<(String, String)> = sources
        .iter()
        .map(|s| (s.title.clone(), s.excerpt.clone()))
        .collect();
    let text = llm.answer(ctx, query, &pairs).await?;
    let cited_source_ids = cited_ids(&text, sources);
    Some(Answer {
        answer: text,
        cited_source_ids,
    })
}

/// Resolve `Source k` references (1-based) to document ids, deduplicated in
/// first-citation order. Out-of-range references are dropped.
fn cited_ids(answer: &str, sources: &[AnswerSource]) -> Vec<String> {
    let mut ids = Vec::new();
    for capture in SOURCE_RE.captures_iter(answer) {
        let Some(index) = capture
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
        else {
            continue;
        };
        if index == 0 || index > sources.len() {
            continue;
        }
        let id = &sources[index - 1].id;
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}
