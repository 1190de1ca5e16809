//! Embedding providers.
//!
//! Concrete [`Embedder`] implementations selected by `[embedding].provider`:
//! - **[`DisabledEmbedder`]**: always fails; used when embeddings are not configured.
//! - **[`OpenAiEmbedder`]**: `POST {url}/v1/embeddings`, key from `OPENAI_API_KEY`.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embeddings` against a local Ollama.
//!
//! Both HTTP providers retry through [`crate::retry::post_json`] and
//! surface every failure as [`RagError::Embedding`].
//!
//! ```rust,no_run
//! # use code_lens::config::EmbeddingConfig;
//! # use code_lens::embedding::create_embedder;
//! let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use code_lens_core::embedding::Embedder;
use code_lens_core::error::RagError;

use crate::config::EmbeddingConfig;
use crate::retry::{post_json, Auth, RetryPolicy};

const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Fails every call. Keeps the pipeline constructible without a provider.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> code_lens_core::Result<Vec<f32>> {
        Err(RagError::embedding("embedding provider is disabled"))
    }
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    /// # Errors
    ///
    /// Returns an error if `model` is not set or `OPENAI_API_KEY` is
    /// missing from the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: base_url(config.url.as_deref(), OPENAI_URL),
            api_key: api_key.into(),
            model,
            dims: config.dims,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> code_lens_core::Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let url = format!("{}/v1/embeddings", self.base_url);
        let json = post_json(
            &self.client,
            "OpenAI",
            &url,
            Auth::Bearer(&self.api_key),
            &body,
            &self.retry,
        )
        .await
        .map_err(RagError::embedding)?;
        parse_openai_response(&json)
    }
}

/// Extract `data[0].embedding`.
fn parse_openai_response(json: &serde_json::Value) -> code_lens_core::Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .ok_or_else(|| RagError::embedding("invalid OpenAI response: missing data[0].embedding"))?;
    parse_vector(embedding)
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: base_url(config.url.as_deref(), OLLAMA_URL),
            model,
            dims: config.dims,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> code_lens_core::Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });
        let url = format!("{}/api/embeddings", self.base_url);
        let json = post_json(&self.client, "Ollama", &url, Auth::None, &body, &self.retry)
            .await
            .map_err(RagError::embedding)?;
        let embedding = json
            .get("embedding")
            .ok_or_else(|| RagError::embedding("invalid Ollama response: missing embedding"))?;
        parse_vector(embedding)
    }
}

/// Parse a JSON number array. Non-numeric entries are an error, not zeros.
fn parse_vector(value: &serde_json::Value) -> code_lens_core::Result<Vec<f32>> {
    let items = value
        .as_array()
        .ok_or_else(|| RagError::embedding("embedding is not an array"))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RagError::embedding("embedding contains a non-numeric value"))
        })
        .collect()
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn base_url(configured: Option<&str>, default: &str) -> String {
    configured.unwrap_or(default).trim_end_matches('/').to_string()
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
