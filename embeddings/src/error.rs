//! Error types for the embeddings crate.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while building, comparing or searching embeddings.
///
/// Every variant describes a violated precondition. None of them are
/// transient, so callers should propagate rather than retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Storage buffer does not have the length required by the format.
    #[error("buffer length must be {expected} for this embedding, but it was {actual}")]
    BufferLength { expected: usize, actual: usize },

    /// Two embeddings (or an embedding and its input) disagree on dimensions.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Bit embeddings pack 8 dimensions per byte.
    #[error("bit embeddings need a dimension count that is a multiple of 8, got {0}")]
    BitDimensions(usize),

    /// Top-k search was asked for zero results.
    #[error("max_results must be greater than 0")]
    InvalidMaxResults,

    /// A buffer could not be interpreted as an embedding at all.
    #[error("malformed embedding buffer: {0}")]
    MalformedBuffer(String),

    /// Serialized payload was not valid base64.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}
