//! Per-request context: id, deadline, and accumulators for degradations
//! and token usage. Passed explicitly through the pipeline; nothing here
//! lives in thread-locals or globals.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    request_id: String,
    deadline: Instant,
    tokens_used: AtomicU32,
    degradations: Mutex<Vec<String>>,
    prompt_versions: Mutex<Vec<String>>,
}

impl RequestContext {
    pub fn new(timeout: Duration) -> Self {
        let seq = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let now_ms = chrono::Utc::now().timestamp_millis();
        Self {
            inner: Arc::new(ContextInner {
                request_id: format!("req-{:x}-{:04x}", now_ms, seq & 0xffff),
                deadline: Instant::now() + timeout,
                tokens_used: AtomicU32::new(0),
                degradations: Mutex::new(Vec::new()),
                prompt_versions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.inner.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.inner.deadline
    }

    pub fn add_tokens(&self, n: u32) {
        self.inner.tokens_used.fetch_add(n, Ordering::Relaxed);
    }

    pub fn tokens_used(&self) -> u32 {
        self.inner.tokens_used.load(Ordering::Relaxed)
    }

    /// Record a skipped enhancement (LLM down, vector DB unreachable, ...).
    /// Surfaced in response metadata, never as an HTTP error.
    pub fn record_degradation(&self, what: impl Into<String>) {
        let what = what.into();
        tracing::warn!(request_id = %self.inner.request_id, degradation = %what, "pipeline degraded");
        self.inner.degradations.lock().push(what);
    }

    pub fn degradations(&self) -> Vec<String> {
        self.inner.degradations.lock().clone()
    }

    pub fn record_prompt_version(&self, version: &str) {
        let mut versions = self.inner.prompt_versions.lock();
        if !versions.iter().any(|v| v == version) {
            versions.push(version.to_string());
        }
    }

    pub fn prompt_versions(&self) -> Vec<String> {
        self.inner.prompt_versions.lock().clone()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.inner.request_id)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestContext::new(Duration::from_secs(1));
        let b = RequestContext::new(Duration::from_secs(1));
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn degradations_accumulate() {
        let ctx = RequestContext::new(Duration::from_secs(1));
        ctx.record_degradation("llm timeout");
        ctx.record_degradation("vector db unreachable");
        assert_eq!(ctx.degradations().len(), 2);
    }

    #[test]
    fn prompt_versions_deduplicate() {
        let ctx = RequestContext::new(Duration::from_secs(1));
        ctx.record_prompt_version("rerank-v2");
        ctx.record_prompt_version("rerank-v2");
        ctx.record_prompt_version("answer-v1");
        assert_eq!(ctx.prompt_versions(), vec!["rerank-v2", "answer-v1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = RequestContext::new(Duration::from_millis(10));
        assert!(!ctx.expired());
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(ctx.expired());
    }
}
