use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use counterpoint_llm::{LlmBackend, LlmError, Result, SafetyVerdict};

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Deterministic backend with scripted rejections and failures.
///
/// Completions are `"{model}:{text}:{attempt}"`, where `attempt` counts
/// calls for that exact text starting at 1. Embeddings are [`fingerprint`]s.
#[derive(Default)]
pub struct MockBackend {
    model: String,
    rejected: HashSet<String>,
    failures: HashSet<(String, u32)>,
    check_failures: HashSet<String>,
    embed_failure_on_call: Option<usize>,
    forbidden: bool,
    attempts: Mutex<HashMap<String, u32>>,
    batch_sizes: Mutex<Vec<usize>>,
    complete_calls: AtomicUsize,
    check_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), ..Default::default() }
    }

    /// A backend that panics on any call. Used to prove a cache hit made no calls.
    pub fn forbidden() -> Self {
        Self { model: "forbidden".to_string(), forbidden: true, ..Default::default() }
    }

    /// `check` rejects this exact text.
    pub fn rejecting(mut self, text: &str) -> Self {
        self.rejected.insert(text.to_string());
        self
    }

    /// `complete` fails on the `attempt`-th call (1-based) for `text`.
    pub fn failing_on(mut self, text: &str, attempt: u32) -> Self {
        self.failures.insert((text.to_string(), attempt));
        self
    }

    /// `check` returns an error for this exact text.
    pub fn failing_check_on(mut self, text: &str) -> Self {
        self.check_failures.insert(text.to_string());
        self
    }

    /// The `call`-th embedding request (1-based, `embed` and `embed_many` alike) fails.
    pub fn failing_embed_on_call(mut self, call: usize) -> Self {
        self.embed_failure_on_call = Some(call);
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    /// Calls to `embed` plus calls to `embed_many`.
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Input sizes seen by `embed_many`, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Number of `complete` calls made for `text`.
    pub fn attempts_for(&self, text: &str) -> u32 {
        self.attempts
            .lock()
            .map(|a| a.get(text).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn next_embed_call(&self) -> Result<()> {
        let call = self.embed_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.embed_failure_on_call == Some(call) {
            return Err(LlmError::ApiError { status: 429, message: "scripted embedding failure".into() });
        }
        Ok(())
    }

    fn guard(&self, operation: &str) {
        if self.forbidden {
            panic!("MockBackend::forbidden received a {operation} call");
        }
    }
}

/// Deterministic two-dimensional vector derived from `text`.
pub fn fingerprint(text: &str) -> Vec<f64> {
    let byte_sum: u32 = text.bytes().map(u32::from).sum();
    vec![text.chars().count() as f64, (byte_sum % 997) as f64]
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.guard("embed");
        self.next_embed_call()?;
        Ok(fingerprint(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        self.guard("embed_many");
        if let Ok(mut sizes) = self.batch_sizes.lock() {
            sizes.push(texts.len());
        }
        self.next_embed_call()?;
        Ok(texts.iter().map(|t| fingerprint(t)).collect())
    }

    async fn check(&self, text: &str) -> Result<SafetyVerdict> {
        self.guard("check");
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if self.check_failures.contains(text) {
            return Err(LlmError::ApiError { status: 500, message: "scripted check failure".into() });
        }
        if self.rejected.contains(text) {
            Ok(SafetyVerdict::rejected("scripted rejection"))
        } else {
            Ok(SafetyVerdict::accepted())
        }
    }

    async fn complete(&self, text: &str, _max_output_tokens: u32) -> Result<String> {
        self.guard("complete");
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut attempts = self
                .attempts
                .lock()
                .map_err(|_| LlmError::MalformedResponse("mock state poisoned".into()))?;
            let counter = attempts.entry(text.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        if self.failures.contains(&(text.to_string(), attempt)) {
            return Err(LlmError::ApiError { status: 500, message: "scripted failure".into() });
        }
        Ok(format!("{}:{}:{}", self.model, text, attempt))
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failure_hits_only_that_attempt() {
        let mock = MockBackend::new("m").failing_on("q", 2);
        assert_eq!(mock.complete("q", 5).await.unwrap(), "m:q:1");
        assert!(mock.complete("q", 5).await.is_err());
        assert_eq!(mock.complete("q", 5).await.unwrap(), "m:q:3");
        assert_eq!(mock.attempts_for("q"), 3);
    }

    #[tokio::test]
    async fn test_rejection_and_batches_are_recorded() {
        let mock = MockBackend::new("m").rejecting("bad");
        assert!(!mock.check("bad").await.unwrap().accepted);
        assert!(mock.check("fine").await.unwrap().accepted);

        let texts = vec!["a".to_string(), "bb".to_string()];
        let vectors = mock.embed_many(&texts).await.unwrap();
        assert_eq!(vectors, vec![fingerprint("a"), fingerprint("bb")]);
        assert_eq!(mock.batch_sizes(), vec![2]);
        assert_eq!(mock.check_calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_embed_and_check_failures() {
        let mock = MockBackend::new("m").failing_embed_on_call(2).failing_check_on("boom");
        assert!(mock.embed("a").await.is_ok());
        assert!(mock.embed_many(&["b".to_string()]).await.is_err());
        assert!(mock.embed("c").await.is_ok());
        assert_eq!(mock.embed_calls(), 3);

        assert!(mock.check("boom").await.is_err());
        assert!(mock.check("fine").await.unwrap().accepted);
    }

    #[tokio::test]
    #[should_panic(expected = "forbidden")]
    async fn test_forbidden_panics() {
        let _ = MockBackend::forbidden().check("anything").await;
    }
}
