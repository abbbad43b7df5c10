//! LLM backend trait and concrete implementations.
//!
//! Backends:
//!   OpenAiBackend  : hosted OpenAI deployment (Azure-style addressing:
//!                    endpoint + deployment + api-version, `api-key` header)
//!   OllamaBackend  : local Ollama daemon (/api/generate, /api/embeddings)
//!
//! Every backend exposes the same four capabilities: embed one text, embed
//! many texts, a minimal-cost safety probe, and one completion. Calls are
//! issued one at a time; nothing here spawns or joins.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LlmError, Result};
use crate::key::KeyLoader;
use crate::retry::RetryPolicy;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ── Verdict ───────────────────────────────────────────────────────────────────

/// Outcome of a safety probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub accepted: bool,
    /// Provider diagnostic when the text was rejected.
    pub detail: Option<String>,
}

impl SafetyVerdict {
    pub fn accepted() -> Self {
        Self { accepted: true, detail: None }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self { accepted: false, detail: Some(detail.into()) }
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Knobs applied to every backend built from configuration.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::Unbounded,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Embeds a single text. No internal retry.
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;
    /// Embeds `texts`; the result is index-aligned with the input.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
    /// Minimal-cost probe deciding whether `text` should be excluded.
    async fn check(&self, text: &str) -> Result<SafetyVerdict>;
    /// Generates one completion of at most `max_output_tokens` tokens.
    async fn complete(&self, text: &str, max_output_tokens: u32) -> Result<String>;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn check_response_status(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if status >= 400 {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| {
                body["error"]["message"]
                    .as_str()
                    .or_else(|| body["error"].as_str())
                    .or_else(|| body["message"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or(text);
        return Err(LlmError::ApiError { status, message });
    }
    Ok(serde_json::from_str(&text)?)
}

/// Parses an OpenAI `/embeddings` response, ordering vectors by their `index`.
pub(crate) fn parse_openai_embeddings(json: &Value) -> Result<Vec<Vec<f64>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| LlmError::MalformedResponse("embedding response has no data array".into()))?;

    let mut indexed = data
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
            let vector: Vec<f64> = serde_json::from_value(item["embedding"].clone())?;
            Ok((index, vector))
        })
        .collect::<Result<Vec<_>>>()?;
    indexed.sort_by_key(|(index, _)| *index);
    if let Some(position) = indexed.iter().enumerate().position(|(i, (index, _))| *index != i) {
        return Err(LlmError::MalformedResponse(format!(
            "embedding indices are not 0..{}: expected {position}, got {}",
            indexed.len(),
            indexed[position].0
        )));
    }

    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

// ── 1. Hosted OpenAI deployment ──────────────────────────────────────────────

pub struct OpenAiBackend {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub model: String,
    api_key: SecretString,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        api_key: SecretString,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            model: model.into(),
            api_key,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    /// Resolves the credential once through `loader` and builds the backend.
    pub fn from_loader(
        loader: &dyn KeyLoader,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let key = loader.key()?;
        Ok(Self::new(key, endpoint, deployment, api_version, model))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_options(mut self, options: &BackendOptions) -> Result<Self> {
        self.retry = options.retry;
        self.client = build_client(options.timeout)?;
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn url(&self, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            operation,
            self.api_version
        )
    }

    async fn post(&self, operation: &str, body: &Value) -> Result<Value> {
        let resp = self
            .client
            .post(self.url(operation))
            .header("api-key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        check_response_status(resp).await
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let body = serde_json::json!({"model": &self.model, "input": text});
        let json = self.post("embeddings", &body).await?;
        parse_openai_embeddings(&json)?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("embedding response is empty".into()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let body = serde_json::json!({"model": &self.model, "input": texts});
        let json = self.post("embeddings", &body).await?;
        parse_openai_embeddings(&json)
    }

    /// One-token completion; a 400 from the provider means the text was refused.
    async fn check(&self, text: &str) -> Result<SafetyVerdict> {
        let body = serde_json::json!({
            "model":      &self.model,
            "prompt":     text,
            "max_tokens": 1,
        });
        match self.post("completions", &body).await {
            Ok(_) => Ok(SafetyVerdict::accepted()),
            Err(LlmError::ApiError { status: 400, message }) => {
                debug!(model = %self.model, %message, "safety probe rejected text");
                Ok(SafetyVerdict::rejected(message))
            }
            Err(e) => Err(e),
        }
    }

    async fn complete(&self, text: &str, max_output_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model":             &self.model,
            "messages":          [{"role": "user", "content": text}],
            "max_tokens":        max_output_tokens,
            "temperature":       1,
            "top_p":             0.5,
            "frequency_penalty": 0.0,
            "presence_penalty":  0,
            "stop":              null,
        });

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let json = self.post("chat/completions", &body).await?;
            let choice = json["choices"]
                .get(0)
                .ok_or_else(|| LlmError::MalformedResponse("completion has no choices".into()))?;

            if let Some(content) = choice["message"]["content"].as_str() {
                return Ok(content.to_string());
            }
            if !self.retry.allows_another(attempts) {
                return Err(LlmError::RetriesExhausted { attempts });
            }
            warn!(model = %self.model, attempts, "completion returned no content, retrying");
        }
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── 2. Ollama (local) ─────────────────────────────────────────────────────────

/// Local Ollama backend.
///
/// `check` always accepts: there is no safety model available locally, so
/// this backend cannot exclude anything. Use a hosted backend when rows
/// must actually be screened.
pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), model: model.into(), client: reqwest::Client::new() }
    }

    pub fn with_options(mut self, options: &BackendOptions) -> Result<Self> {
        self.client = build_client(options.timeout)?;
        Ok(self)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Resolves the local daemon address the way the Ollama CLI does.
pub fn default_ollama_url() -> String {
    match std::env::var("OLLAMA_HOST") {
        Ok(host) if host.starts_with("http://") || host.starts_with("https://") => host,
        Ok(host) if !host.trim().is_empty() => format!("http://{host}"),
        _ => DEFAULT_OLLAMA_URL.to_string(),
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let body = serde_json::json!({"model": &self.model, "prompt": text});
        let resp = self.client.post(self.url("embeddings")).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        let vector: Vec<f64> = serde_json::from_value(json["embedding"].clone())?;
        Ok(vector)
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    async fn check(&self, _text: &str) -> Result<SafetyVerdict> {
        Ok(SafetyVerdict::accepted())
    }

    /// Returns the first response as-is; no retry on the local path.
    async fn complete(&self, text: &str, max_output_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model":   &self.model,
            "prompt":  text,
            "stream":  false,
            "options": {"num_predict": max_output_tokens},
        });
        let resp = self.client.post(self.url("generate")).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        json["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse("generate response has no `response` field".into()))
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { true }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
