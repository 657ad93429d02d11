//! Embedding providers and the batching generator.
//!
//! Concrete [`EmbeddingProvider`] implementations:
//! - **[`DisabledProvider`]**: always fails permanently; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: `POST {url}/embeddings` on any OpenAI-compatible endpoint.
//! - **[`OllamaProvider`]**: `POST {url}/api/embed` on a local or remote Ollama.
//!
//! Providers make exactly one HTTP call per [`embed`](EmbeddingProvider::embed)
//! and classify failures; retries live in [`EmbeddingGenerator`]:
//! - HTTP 429 and 5xx → transient, retried
//! - Network errors → transient, retried
//! - HTTP 400, 413 and 422 → rejected; only that batch goes without vectors
//! - Other 4xx, malformed bodies, wrong dimensions → permanent
//! - Backoff: `retry_base_ms × 2^attempt`, attempt capped at 5
//!
//! Once retries are exhausted, or on a permanent failure, the generator
//! degrades: no further calls are made for the rest of the run and every
//! later document is written without a vector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use schemadex_core::embedding::{check_vectors, EmbeddingProvider};
use schemadex_core::error::EmbedError;

use crate::config::EmbeddingConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

// ============ Disabled Provider ============

/// A no-op provider. Any attempt to embed text fails permanently.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Permanent(
            "Embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider for the OpenAI embeddings API and compatible gateways.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a provider from configuration, reading the API key from the
    /// environment variable named by `embedding.api_key_env`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self
            .client
            .post(format!("{}/embeddings", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::Transient(format!("OpenAI request failed: {}", e)))?;

        let json = read_json(response, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index` when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| malformed("OpenAI", "missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| malformed("OpenAI", "missing embedding"))?;
        indexed.push((index, float_array(embedding, "OpenAI")?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using an Ollama instance (default `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EmbedError::Transient(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let json = read_json(response, "Ollama").await?;
        let embeddings = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| malformed("Ollama", "missing embeddings array"))?;
        embeddings
            .iter()
            .map(|e| float_array(e, "Ollama"))
            .collect()
    }
}

// ============ Shared HTTP helpers ============

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Map a non-success status to its error class.
pub fn classify_status(status: StatusCode, body: &str, service: &str) -> EmbedError {
    let message = format!("{} API error {}: {}", service, status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        EmbedError::Transient(message)
    } else if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        EmbedError::Rejected(message)
    } else {
        EmbedError::Permanent(message)
    }
}

async fn read_json(
    response: reqwest::Response,
    service: &str,
) -> Result<serde_json::Value, EmbedError> {
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body_text, service));
    }
    response
        .json()
        .await
        .map_err(|e| malformed(service, &e.to_string()))
}

fn float_array(value: &serde_json::Value, service: &str) -> Result<Vec<f32>, EmbedError> {
    value
        .as_array()
        .ok_or_else(|| malformed(service, "embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| malformed(service, "embedding value is not a number"))
        })
        .collect()
}

fn malformed(service: &str, detail: &str) -> EmbedError {
    EmbedError::Permanent(format!("Invalid {} response: {}", service, detail))
}

/// Create the provider named by `embedding.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Generator ============

/// Delay before retry number `attempt` (0-based).
pub fn backoff_delay(retry_base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(retry_base_ms.saturating_mul(1 << attempt.min(5)))
}

/// Batches texts to a provider with retry and graceful degradation.
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_retries: u32,
    retry_base_ms: u64,
    degraded: AtomicBool,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_base_ms: config.retry_base_ms,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dims(&self) -> usize {
        self.provider.dims()
    }

    /// True once a batch exhausted its retries or failed permanently.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Embed one batch. The result has one entry per input; `None` marks a
    /// text left without a vector.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        if texts.is_empty() {
            return Vec::new();
        }
        if self.is_degraded() {
            return vec![None; texts.len()];
        }

        let mut attempt = 0u32;
        loop {
            let outcome = match self.provider.embed(texts).await {
                Ok(vectors) => {
                    check_vectors(&vectors, texts.len(), self.provider.dims()).map(|_| vectors)
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(vectors) => {
                    debug!(count = texts.len(), "embedded batch");
                    return vectors.into_iter().map(Some).collect();
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_base_ms, attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "embedding failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e @ EmbedError::Rejected(_)) => {
                    warn!(count = texts.len(), "batch left without vectors: {}", e);
                    return vec![None; texts.len()];
                }
                Err(e) => {
                    warn!(
                        "embedding unavailable, continuing lexical-only: {}",
                        e
                    );
                    self.degraded.store(true, Ordering::SeqCst);
                    return vec![None; texts.len()];
                }
            }
        }
    }
}
