//! Pattern-based query intent classification. Pure string inspection, no
//! model calls: first matching rule wins.

use crate::types::QueryIntent;

const ROLE_LEXICON: &[&str] = &["ceo", "president", "chief", "executive", "director"];
const SERVICE_LEXICON: &[&str] = &["service", "services", "solutions", "consulting", "support"];
const NAV_LEXICON: &[&str] = &["contact", "about", "team", "careers", "locations"];
const TRANSACTIONAL_LEXICON: &[&str] = &["buy", "download", "order", "request", "hire"];
const QUESTION_STARTERS: &[&str] = &["how", "what", "why", "when", "where"];
const INTERROGATIVES: &[&str] = &["who", "what", "which", "where", "whom"];

#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub intent: QueryIntent,
    pub instructions: String,
}

/// Classify a query and synthesize the prompt instructions for its intent.
/// Caller-supplied custom instructions are appended and flagged as taking
/// precedence over everything else.
pub fn analyze(query: &str, custom_instructions: Option<&str>) -> QueryAnalysis {
    let intent = classify(query);
    let mut instructions = intent_instructions(intent).to_string();
    if let Some(custom) = custom_instructions.map(str::trim).filter(|c| !c.is_empty()) {
        instructions.push_str(
            "\n\nHIGHEST PRIORITY — caller instructions (override everything above): ",
        );
        instructions.push_str(custom);
    }
    QueryAnalysis {
        intent,
        instructions,
    }
}

fn classify(query: &str) -> QueryIntent {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    if looks_like_person_name(trimmed) {
        return QueryIntent::PersonName;
    }
    if contains_any(&words, ROLE_LEXICON) && is_interrogative(trimmed, &words) {
        return QueryIntent::ExecutiveRole;
    }
    if contains_any(&words, SERVICE_LEXICON) {
        return QueryIntent::Service;
    }
    if words
        .first()
        .map_or(false, |first| QUESTION_STARTERS.contains(first))
    {
        return QueryIntent::HowTo;
    }
    if contains_any(&words, NAV_LEXICON) {
        return QueryIntent::Navigational;
    }
    if contains_any(&words, TRANSACTIONAL_LEXICON) {
        return QueryIntent::Transactional;
    }
    QueryIntent::General
}

/// Two tokens, both initial-capital, each at least three letters.
fn looks_like_person_name(query: &str) -> bool {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.len() != 2 {
        return false;
    }
    tokens.iter().all(|token| {
        let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
        letters.len() >= 3
            && token
                .chars()
                .next()
                .map_or(false, |first| first.is_uppercase())
    })
}

fn is_interrogative(query: &str, words: &[&str]) -> bool {
    query.contains('?') || words.first().map_or(false, |first| INTERROGATIVES.contains(first))
}

fn contains_any(words: &[&str], lexicon: &[&str]) -> bool {
    words.iter().any(|word| {
        let bare: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        lexicon.contains(&bare.as_str())
    })
}

fn intent_instructions(intent: QueryIntent) -> &'static str {
    match intent {
        QueryIntent::PersonName => {
            "The user is looking for a specific person. Treat staff or professional \
             profile pages whose title matches the name as the primary target; \
             articles that merely mention the person are secondary."
        }
        QueryIntent::ExecutiveRole => {
            "The user is asking about a leadership role. Prefer profile pages of the \
             person holding that role over news posts or opinion pieces that discuss \
             leadership in general."
        }
        QueryIntent::Service => {
            "The user is looking for a service offering. Prefer dedicated service or \
             solution pages that describe what is offered over blog commentary."
        }
        QueryIntent::HowTo => {
            "The user wants an explanation or instructions. Prefer content that \
             directly answers the question with concrete steps or definitions."
        }
        QueryIntent::Navigational => {
            "The user is trying to reach a specific section of the site. Prefer the \
             canonical page for that destination over content that mentions it."
        }
        QueryIntent::Transactional => {
            "The user wants to take an action (buy, download, request, hire). Prefer \
             pages where that action can be completed."
        }
        QueryIntent::General => {
            "Rank by topical relevance to the query, preferring focused content over \
             passing mentions."
        }
    }
}
