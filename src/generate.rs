//! Text generation providers.
//!
//! A [`Generator`] turns a formatted prompt into an explanation. The
//! only remote provider is Gemini:
//!
//! ```text
//! POST {url}/v1beta/models/{model}:generateContent
//! x-goog-api-key: {GEMINI_API_KEY}
//! { "contents": [ { "parts": [ { "text": prompt } ] } ] }
//! ```
//!
//! The answer is read from `candidates[0].content.parts[0].text`; a
//! response without it is an error rather than an empty explanation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::retry::{post_json, Auth, RetryPolicy};

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::new("generation provider is disabled"))
    }
}

/// Stands in for a configured provider that could not be created (for
/// example a missing API key), so commands that never generate still run.
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Generator for UnavailableGenerator {
    fn model_name(&self) -> &str {
        "unavailable"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::new(&self.reason))
    }
}

pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiGenerator {
    /// # Errors
    ///
    /// Returns an error if `GEMINI_API_KEY` is not set.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config
                .url
                .as_deref()
                .unwrap_or(GEMINI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        let json = post_json(
            &self.client,
            "Gemini",
            &url,
            Auth::Header("x-goog-api-key", &self.api_key),
            &body,
            &self.retry,
        )
        .await
        .map_err(GenerationError::new)?;
        parse_gemini_response(&json)
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| {
            GenerationError::new("invalid Gemini response: missing candidates[0].content.parts[0].text")
        })
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gemini_response() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "It logs users in." }] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "It logs users in.");
    }

    #[test]
    fn test_parse_gemini_response_without_candidates() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(parse_gemini_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_generator_fails() {
        assert!(DisabledGenerator.generate("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_generator_reports_reason() {
        let g = UnavailableGenerator::new("GEMINI_API_KEY environment variable not set");
        let err = g.generate("hi").await.unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_default_model() {
        let g = GeminiGenerator::with_api_key(&GenerationConfig::default(), "k").unwrap();
        assert_eq!(g.model_name(), GEMINI_DEFAULT_MODEL);
    }
}
