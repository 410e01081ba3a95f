//! LLM client: one chat-completion endpoint, four task contracts (query
//! rewrite, rerank, strict answer, alternative queries) plus optional query
//! expansion. Every call has a hard timeout and bounded concurrency; any
//! failure is a logged degradation the pipeline proceeds without, never a
//! request-fatal error.

pub mod parse;
pub mod prompts;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::LlmConfig;
use crate::context::RequestContext;
use crate::types::QueryIntent;
use prompts::{intent_anchors, template, PromptTask};

const TEMPERATURE: f32 = 0.1;
const RERANK_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32)
        -> Result<ChatCompletion>;
}

/// OpenAI-compatible chat completions backend.
pub struct HttpChatBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpChatBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs.max(1) * 2))
            .build()
            .context("failed to build LLM HTTP client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<ChatCompletion> {
        let request = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": temperature,
            "stream": false,
        });

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!("LLM request to {} timed out", self.url)
            } else if e.is_connect() {
                anyhow!("failed to connect to LLM at {}: {}", self.url, e)
            } else {
                anyhow!("LLM request to {} failed: {}", self.url, e)
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read LLM response body")?;

        // Gateways sometimes return HTML error pages with a 200.
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "LLM endpoint returned HTML instead of JSON (HTTP {}): {}",
                status,
                preview
            ));
        }
        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(anyhow!("LLM returned HTTP {}: {}", status, preview));
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!("failed to parse LLM response: {} ({})", e, preview)
        })?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("LLM response missing message content"))?
            .to_string();
        let tokens_used = value["usage"]["total_tokens"].as_u64().map(|t| t as u32);
        Ok(ChatCompletion {
            content,
            tokens_used,
        })
    }
}

/// Structured outcome of a rewrite call.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRewrite {
    pub rewritten_query: String,
    #[serde(default)]
    pub alternative_queries: Vec<String>,
    #[serde(default)]
    pub key_terms: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// One candidate as presented to the rerank judge.
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub content_type: String,
    pub published: Option<chrono::DateTime<chrono::Utc>>,
    pub word_count: usize,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub lexical_score: f32,
}

#[derive(Debug, Clone)]
pub struct AiJudgement {
    pub id: String,
    pub ai_score: f32,
    pub reason: String,
}

/// Rerank output as a tagged variant: either scores parsed from the model,
/// or the reason the call produced nothing usable.
#[derive(Debug)]
pub enum RerankOutcome {
    Scored(Vec<AiJudgement>),
    Unavailable(String),
}

pub struct LlmClient {
    backend: Arc<dyn ChatBackend>,
    timeout: Duration,
    permits: Arc<Semaphore>,
    waiting: AtomicUsize,
    queue_limit: usize,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn ChatBackend>, config: &LlmConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            waiting: AtomicUsize::new(0),
            queue_limit: config.queue_limit,
        }
    }

    /// Run one prompt through the backend with the concurrency bound and
    /// hard timeout applied. Returns `None` on any failure — queue
    /// overflow, timeout, transport or parse errors — after recording the
    /// degradation on the request context.
    async fn call(
        &self,
        ctx: &RequestContext,
        task: PromptTask,
        prompt: String,
        max_tokens: u32,
    ) -> Option<String> {
        let spec = template(task);
        ctx.record_prompt_version(spec.version);

        // Fail fast when the wait queue is saturated instead of piling up.
        let _permit = match self.permits.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                let queued = self.waiting.fetch_add(1, Ordering::SeqCst);
                if queued >= self.queue_limit {
                    self.waiting.fetch_sub(1, Ordering::SeqCst);
                    ctx.record_degradation(format!("llm {}: queue full", spec.name));
                    return None;
                }
                let permit = self.permits.acquire().await;
                self.waiting.fetch_sub(1, Ordering::SeqCst);
                permit.expect("llm semaphore never closes")
            }
        };

        let call_timeout = self.timeout.min(ctx.remaining().max(Duration::from_millis(1)));
        match tokio::time::timeout(
            call_timeout,
            self.backend.complete(&prompt, max_tokens, TEMPERATURE),
        )
        .await
        {
            Ok(Ok(completion)) => {
                if let Some(tokens) = completion.tokens_used {
                    ctx.add_tokens(tokens);
                }
                Some(completion.content)
            }
            Ok(Err(e)) => {
                ctx.record_degradation(format!("llm {}: {:#}", spec.name, e));
                None
            }
            Err(_) => {
                ctx.record_degradation(format!(
                    "llm {}: timed out after {}ms",
                    spec.name,
                    call_timeout.as_millis()
                ));
                None
            }
        }
    }

    /// Query rewrite. Falls back to `None` (caller keeps the original
    /// query) on any failure, including unparseable output.
    pub async fn rewrite(&self, ctx: &RequestContext, query: &str) -> Option<QueryRewrite> {
        let spec = template(PromptTask::Rewrite);
        let prompt = spec.render(&[("query", query)]);
        let raw = self.call(ctx, PromptTask::Rewrite, prompt, spec.max_tokens).await?;
        match parse::parse_lenient::<QueryRewrite>(&raw) {
            Some(rewrite) if !rewrite.rewritten_query.trim().is_empty() => Some(rewrite),
            _ => {
                ctx.record_degradation("llm rewrite: unparseable output, keeping original query");
                None
            }
        }
    }

    /// Query expansion: plain rephrasings, one per line.
    pub async fn expand(&self, ctx: &RequestContext, query: &str, count: usize) -> Vec<String> {
        let spec = template(PromptTask::Expand);
        let prompt = spec.render(&[("query", query), ("count", &count.to_string())]);
        match self.call(ctx, PromptTask::Expand, prompt, spec.max_tokens).await {
            Some(raw) => parse::parse_lines(&raw),
            None => Vec::new(),
        }
    }

    /// Listwise rerank. The judged array may be partial or noisy; coverage
    /// enforcement and normalization happen in `rank::rerank`.
    pub async fn rerank(
        &self,
        ctx: &RequestContext,
        query: &str,
        instructions: &str,
        intent: QueryIntent,
        candidates: &[RerankCandidate],
    ) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome::Scored(Vec::new());
        }
        let spec = template(PromptTask::Rerank);
        let prompt = spec.render(&[
            ("query", query),
            ("intent", intent.as_str()),
            ("instructions", instructions),
            ("anchors", intent_anchors(intent)),
            ("candidates", &format_candidates(candidates)),
        ]);

        let raw = match self.call(ctx, PromptTask::Rerank, prompt, spec.max_tokens).await {
            Some(raw) => raw,
            None => return RerankOutcome::Unavailable("llm call failed".into()),
        };

        #[derive(Deserialize)]
        struct RawJudgement {
            id: serde_json::Value,
            ai_score: f32,
            #[serde(default)]
            reason: String,
        }

        match parse::parse_lenient::<Vec<RawJudgement>>(&raw) {
            Some(parsed) if !parsed.is_empty() => RerankOutcome::Scored(
                parsed
                    .into_iter()
                    .map(|j| AiJudgement {
                        id: match j.id {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        },
                        ai_score: j.ai_score,
                        reason: j.reason,
                    })
                    .collect(),
            ),
            _ => {
                ctx.record_degradation("llm rerank: unparseable output");
                RerankOutcome::Unavailable(format!(
                    "unparseable rerank output: {}",
                    raw.chars().take(120).collect::<String>()
                ))
            }
        }
    }

    /// Strict-mode answer. Returns the raw answer text; citation extraction is
    /// the answerer's job.
    pub async fn answer(
        &self,
        ctx: &RequestContext,
        query: &str,
        sources: &[(String, String)],
    ) -> Option<String> {
        if sources.is_empty() {
            return None;
        }
        let formatted: String = sources
            .iter()
            .enumerate()
            .map(|(i, (title, excerpt))| {
                format!("Source {}: {}\n{}", i + 1, title, excerpt)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let spec = template(PromptTask::Answer);
        let prompt = spec.render(&[("query", query), ("sources", &formatted)]);
        self.call(ctx, PromptTask::Answer, prompt, spec.max_tokens)
            .await
            .map(|answer| answer.trim().to_string())
            .filter(|answer| !answer.is_empty())
    }

    /// Alternative queries, built only from terms present in the results.
    pub async fn alternative_queries(
        &self,
        ctx: &RequestContext,
        query: &str,
        results: &[(String, String)],
    ) -> Vec<String> {
        if results.is_empty() {
            return Vec::new();
        }
        let formatted: String = results
            .iter()
            .map(|(title, excerpt)| format!("- {}: {}", title, excerpt))
            .collect::<Vec<_>>()
            .join("\n");
        let spec = template(PromptTask::AltQueries);
        let prompt = spec.render(&[("query", query), ("results", &formatted)]);
        let raw = match self
            .call(ctx, PromptTask::AltQueries, prompt, spec.max_tokens)
            .await
        {
            Some(raw) => raw,
            None => return Vec::new(),
        };
        let mut queries: Vec<String> =
            parse::parse_lenient::<Vec<String>>(&raw).unwrap_or_else(|| parse::parse_lines(&raw));
        queries.retain(|q| !q.trim().is_empty());
        queries.truncate(5);
        queries
    }
}

fn format_candidates(candidates: &[RerankCandidate]) -> String {
    candidates
        .iter()
        .map(|c| {
            let excerpt: String = c.excerpt.chars().take(RERANK_EXCERPT_CHARS).collect();
            let published = match c.published {
                Some(date) => format!("{} ({})", date.format("%Y-%m-%d"), freshness_label(date)),
                None => "unknown".to_string(),
            };
            format!(
                "id: {}\ntitle: {}\ntype: {}\npublished: {}\nwords: {}\ncategories: {}\ntags: {}\nlexical_score: {:.3}\nexcerpt: {}",
                c.id,
                c.title,
                c.content_type,
                published,
                c.word_count,
                c.categories.join(", "),
                c.tags.join(", "),
                c.lexical_score,
                excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Freshness label shown to the judge; thresholds mirror the freshness
/// bonus in the rubric so prompt and scoring agree.
pub fn freshness_label(published: chrono::DateTime<chrono::Utc>) -> &'static str {
    let age_days = (chrono::Utc::now() - published).num_days();
    if age_days < 30 {
        "very recent"
    } else if age_days < 90 {
        "recent"
    } else if age_days < 180 {
        "current"
    } else {
        "older"
    }
}
