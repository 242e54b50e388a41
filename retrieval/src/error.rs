//! Error types for text similarity matching.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while encoding text or matching it against
/// candidates.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding construction, comparison or search failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] textsim_embeddings::EmbeddingError),

    /// Encoder needs credentials that are not configured.
    #[error("text encoder not configured")]
    ProviderNotConfigured,

    /// Encoder service returned an error.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Encoder service returned something we could not use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Encoder output length does not fit the configured dimensions.
    #[error("encoder returned {length} values, which is not a multiple of {dimensions} dimensions")]
    EncoderOutput { length: usize, dimensions: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
