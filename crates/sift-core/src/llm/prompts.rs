//! Versioned prompt registry. Every LLM task renders from a named template
//! with `{{slot}}` parameters; the version string of each template used in
//! a request is surfaced in response metadata so prompt changes can be
//! correlated with quality shifts.

use crate::types::QueryIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTask {
    Rewrite,
    Rerank,
    Answer,
    AltQueries,
    Expand,
}

pub struct PromptTemplate {
    pub name: &'static str,
    pub version: &'static str,
    pub max_tokens: u32,
    template: &'static str,
}

impl PromptTemplate {
    pub fn render(&self, slots: &[(&str, &str)]) -> String {
        let mut output = self.template.to_string();
        for (name, value) in slots {
            output = output.replace(&format!("{{{{{}}}}}", name), value);
        }
        output
    }
}

pub fn template(task: PromptTask) -> &'static PromptTemplate {
    match task {
        PromptTask::Rewrite => &REWRITE,
        PromptTask::Rerank => &RERANK,
        PromptTask::Answer => &ANSWER,
        PromptTask::AltQueries => &ALT_QUERIES,
        PromptTask::Expand => &EXPAND,
    }
}

static REWRITE: PromptTemplate = PromptTemplate {
    name: "rewrite",
    version: "rewrite-v1",
    max_tokens: 300,
    template: r#"You improve search queries for a content site. Rewrite the user's query to be maximally retrievable without changing its meaning.

User query: "{{query}}"

Respond with ONLY a JSON object:
{"rewritten_query": "...", "alternative_queries": ["...", "..."], "key_terms": ["..."], "synonyms": ["..."]}"#,
};

static RERANK: PromptTemplate = PromptTemplate {
    name: "rerank",
    version: "rerank-v2",
    max_tokens: 1200,
    template: r#"You are a search relevance judge for a content site. Score each candidate result for the query below.

Query: "{{query}}"
Query intent: {{intent}}

{{instructions}}

Scoring rubric — each candidate gets an integer score from 0 to 100, the sum of:
- Semantic relevance to the query: up to 40 points
- Match with the user's intent: up to 30 points
- Content quality and completeness: up to 20 points
- Specificity (focused on the topic vs. passing mention): up to 10 points
Freshness bonus on top (cap the total at 100): +5 if published within 30 days, +3 within 90 days, +1 within 180 days.

{{anchors}}

Candidates:
{{candidates}}

Respond with ONLY a JSON array containing EVERY candidate id exactly once:
[{"id": "...", "ai_score": 0, "reason": "..."}]"#,
};

static ANSWER: PromptTemplate = PromptTemplate {
    name: "answer",
    version: "answer-strict-v1",
    max_tokens: 500,
    template: r#"Answer the question using ONLY the facts stated in the numbered sources below.

Question: "{{query}}"

Sources:
{{sources}}

Hard rules:
1. Use only facts explicitly present in the sources. No outside knowledge, no inference beyond what is written.
2. Cite every fact with its source number, e.g. (Source 2).
3. Never mention any topic that does not appear in the sources — not even to say it is absent.
4. Do not add background or context that the sources do not supply.
5. If the sources do not answer the question, state exactly which relevant facts the sources do contain, then stop."#,
};

static ALT_QUERIES: PromptTemplate = PromptTemplate {
    name: "alt_queries",
    version: "alt-queries-v1",
    max_tokens: 200,
    template: r#"The user searched for: "{{query}}"

The top results were:
{{results}}

Suggest 3 to 5 alternative search queries the user could try next. STRICT RULE: build each query only from terms and concepts that appear in the results above; introduce no outside terms.

Respond with ONLY a JSON array of strings."#,
};

static EXPAND: PromptTemplate = PromptTemplate {
    name: "expand",
    version: "expand-v1",
    max_tokens: 150,
    template: r#"Rephrase this search query {{count}} different ways, preserving its meaning. Output one query per line, nothing else.

Query: "{{query}}""#,
};

/// Intent-specific score anchors injected into the rerank prompt. These pin
/// the ends of the scale so the judge's scores stay comparable across
/// requests.
pub fn intent_anchors(intent: QueryIntent) -> &'static str {
    match intent {
        QueryIntent::PersonName => {
            "Score anchors for a person-name query:\n\
             - A professionals/staff profile whose title matches the name exactly: 95-100.\n\
             - An article about or interviewing that person: 60-80.\n\
             - Generic content that merely mentions the name: at most 40."
        }
        QueryIntent::ExecutiveRole => {
            "Score anchors for a leadership-role query:\n\
             - The profile page of the person holding the role: 90-100.\n\
             - Announcements naming the role holder: 60-80.\n\
             - General leadership commentary: at most 45."
        }
        QueryIntent::Service => {
            "Score anchors for a service query:\n\
             - A dedicated service or solution page describing the offering: 85-100.\n\
             - Case studies using the service: 55-75.\n\
             - Blog posts that mention it in passing: at most 45."
        }
        QueryIntent::HowTo => {
            "Score anchors for an instructional query:\n\
             - Content that directly answers the question with steps or definitions: 85-100.\n\
             - Related background material: at most 60."
        }
        QueryIntent::Navigational => {
            "Score anchors for a navigational query:\n\
             - The canonical destination page: 90-100.\n\
             - Pages that link to or mention the destination: at most 50."
        }
        QueryIntent::Transactional => {
            "Score anchors for a transactional query:\n\
             - A page where the action can be completed: 90-100.\n\
             - Informational content about the action: at most 55."
        }
        QueryIntent::General => {
            "Score anchors: content focused on the query topic scores high; \
             passing mentions score at most 40."
        }
    }
}
