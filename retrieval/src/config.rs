//! Configuration for text similarity matching.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use textsim_embeddings::{DEFAULT_DIMENSION, DEFAULT_SIMILARITY_THRESHOLD, KeyComparison};

use crate::error::{Result, RetrievalError};

/// Default token budget passed to the encoder for each text.
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Embedding computation.
    pub embedder: EmbedderConfig,

    /// Candidate embedding cache.
    pub cache: CacheConfig,

    /// Remote encoder service.
    pub encoder: EncoderConfig,
}

impl MatcherConfig {
    /// Parse a configuration from TOML. Missing sections and fields fall
    /// back to their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the embedder configuration.
    pub fn with_embedder(mut self, config: EmbedderConfig) -> Self {
        self.embedder = config;
        self
    }

    /// Set the cache configuration.
    pub fn with_cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Set the encoder configuration.
    pub fn with_encoder(mut self, config: EncoderConfig) -> Self {
        self.encoder = config;
        self
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.embedder.max_tokens == 0 {
            return Err(RetrievalError::Config(
                "embedder.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.encoder.dimensions == 0 {
            return Err(RetrievalError::Config(
                "encoder.dimensions must be greater than 0".to_string(),
            ));
        }
        if self.cache.sliding_expiration_secs == 0 {
            return Err(RetrievalError::Config(
                "cache.sliding_expiration_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for turning text into embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Maximum number of tokens the encoder considers per text.
    pub max_tokens: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Configuration for the expiring candidate cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries unused for this long are evicted (in seconds).
    pub sliding_expiration_secs: u64,

    /// Minimum similarity for a candidate to be returned.
    pub similarity_threshold: f32,

    /// Whether cache keys are compared case-sensitively.
    pub case_sensitive: bool,
}

impl CacheConfig {
    /// Sliding expiration window.
    pub fn sliding_expiration(&self) -> Duration {
        Duration::from_secs(self.sliding_expiration_secs)
    }

    /// Key comparison implied by `case_sensitive`.
    pub fn key_comparison(&self) -> KeyComparison {
        if self.case_sensitive {
            KeyComparison::CaseSensitive
        } else {
            KeyComparison::CaseInsensitive
        }
    }

    /// Set the sliding expiration window.
    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration_secs = window.as_secs();
        self
    }

    /// Set the default similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sliding_expiration_secs: 300, // 5 minutes
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            case_sensitive: true,
        }
    }
}

/// Configuration for an OpenAI-compatible encoder service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// API base URL, without the `/embeddings` suffix.
    pub base_url: String,

    /// Model name sent with each request.
    pub model: String,

    /// Number of dimensions the model produces.
    pub dimensions: usize,

    /// Environment variable holding the bearer token, if any.
    pub api_key_env: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: DEFAULT_DIMENSION,
            api_key_env: "TEXTSIM_API_KEY".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.embedder.max_tokens, 512);
        assert_eq!(config.cache.sliding_expiration(), Duration::from_secs(300));
        assert_eq!(config.cache.similarity_threshold, 0.5);
        assert_eq!(config.cache.key_comparison(), KeyComparison::CaseSensitive);
        assert_eq!(config.encoder.dimensions, 384);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MatcherConfig::from_toml_str(
            r#"
            [cache]
            sliding_expiration_secs = 60
            case_sensitive = false

            [encoder]
            base_url = "http://encoder.internal/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.sliding_expiration_secs, 60);
        assert_eq!(config.cache.key_comparison(), KeyComparison::CaseInsensitive);
        assert_eq!(config.cache.similarity_threshold, 0.5);
        assert_eq!(config.encoder.base_url, "http://encoder.internal/v1");
        assert_eq!(config.encoder.model, "all-MiniLM-L6-v2");
        assert_eq!(config.embedder, EmbedderConfig::default());
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = MatcherConfig::from_toml_str("[cache]\nsliding_expiration_secs = 0\n").unwrap_err();
        assert!(matches!(err, RetrievalError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = MatcherConfig::from_toml_str("[cache\n").unwrap_err();
        assert!(matches!(err, RetrievalError::Toml(_)));
    }
}
