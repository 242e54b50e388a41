//! Text encoders.
//!
//! An encoder turns text into the raw `f32` output of a sentence embedding
//! model. Everything downstream (quantization, similarity, caching) only
//! depends on the [`TextEncoder`] trait.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::EncoderConfig;
use crate::error::{Result, RetrievalError};

/// Trait for text encoders.
///
/// Implementations must be deterministic: the same text and token budget
/// always produce the same output. The output is either one pooled vector
/// of [`TextEncoder::dimensions`] values or token-major rows of that width,
/// which the caller mean-pools.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Get the name of this encoder.
    fn name(&self) -> &str;

    /// Number of dimensions per output vector.
    fn dimensions(&self) -> usize;

    /// Encode `text`, considering at most `max_tokens` tokens.
    async fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<f32>>;
}

/// Encoder backed by an OpenAI-compatible `/embeddings` endpoint, such as
/// a locally hosted sentence-transformers server.
pub struct HttpTextEncoder {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// Model name.
    model: String,

    /// Expected output dimensions.
    dimensions: usize,

    /// HTTP client.
    client: reqwest::Client,
}

impl HttpTextEncoder {
    /// Create an encoder from configuration, reading the API key from the
    /// configured environment variable if it is set.
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            api_key: std::env::var(&config.api_key_env).ok(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            client: reqwest::Client::new(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for HttpTextEncoder {
    fn default() -> Self {
        Self::new(&EncoderConfig::default())
    }
}

#[async_trait]
impl TextEncoder for HttpTextEncoder {
    fn name(&self) -> &str {
        "http"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<f32>> {
        let input = truncate_tokens(text, max_tokens);
        debug!("Encoding text with model: {}", self.model);

        let body = serde_json::json!({
            "input": input,
            "model": self.model,
        });

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }
        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            warn!("Encoder rate limited, retry after {retry_after}s");
            return Err(RetrievalError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if response.status() == reqwest::StatusCode::UNAUTHORIZED && self.api_key.is_none() {
            return Err(RetrievalError::ProviderNotConfigured);
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::ApiRequest(format!(
                "API error: {error_text}"
            )));
        }

        let payload = response.text().await?;
        let result: EmbeddingsResponse = serde_json::from_str(&payload)?;
        let output = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        debug!("Encoded text into {} values", output.len());
        Ok(output)
    }
}

/// Keep the first `max_tokens` whitespace-delimited tokens of `text`.
///
/// Services count model tokens, which are never fewer than words, so this
/// is an upper bound rather than an exact budget.
pub fn truncate_tokens(text: &str, max_tokens: usize) -> &str {
    match text.split_whitespace().nth(max_tokens) {
        Some(first_excluded) => {
            let end = first_excluded.as_ptr() as usize - text.as_ptr() as usize;
            text[..end].trim_end()
        }
        None => text,
    }
}

/// OpenAI-compatible response format.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsData {
    embedding: Vec<f32>,
}
