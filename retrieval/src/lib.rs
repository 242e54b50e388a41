//! # Text Similarity Retrieval
//!
//! This crate turns text into embeddings through a pluggable encoder and
//! matches it against candidate strings:
//!
//! - **Encoders**: the [`TextEncoder`] seam, with an HTTP implementation
//! - **Embedder**: encoder output pooled and quantized into any format
//! - **Matching**: candidate ranking with a sliding-expiration cache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Similarity Matching                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │ TextEncoder  │─►│LocalEmbedder │─►│  Expiring    │          │
//! │  │ (HTTP, ...)  │  │ pool+quantize│  │    Store     │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! │                          │                  │                   │
//! │                          └────────┬─────────┘                   │
//! │                                   ▼                             │
//! │                        ┌────────────────────┐                   │
//! │                        │LocalEmbeddingsCache│                   │
//! │                        │ (SimilarityMatcher)│                   │
//! │                        └────────────────────┘                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use textsim_retrieval::{HttpTextEncoder, LocalEmbeddingsCache, MatcherConfig};
//!
//! let config = MatcherConfig::from_toml_str(&std::fs::read_to_string("textsim.toml")?)?;
//! let matcher: LocalEmbeddingsCache<_> =
//!     LocalEmbeddingsCache::with_config(HttpTextEncoder::new(&config.encoder), &config);
//!
//! let results = matcher.find_closest("beans", ["Tea", "Latte", "Coffee"], None).await?;
//! ```

pub mod config;
pub mod embedder;
pub mod encoder;
pub mod error;
pub mod expiring;
pub mod matcher;

pub use config::{CacheConfig, EmbedderConfig, EncoderConfig, MatcherConfig};
pub use embedder::{LocalEmbedder, SimilarityQuery};
pub use encoder::{HttpTextEncoder, TextEncoder};
pub use error::{Result, RetrievalError};
pub use expiring::ExpiringStore;
pub use matcher::{LocalEmbeddingsCache, SimilarityMatcher, SimilarityResult};

// Re-export from dependencies for convenience
pub use textsim_embeddings::{
    Embedding, EmbeddingF32, EmbeddingFormat, EmbeddingI1, EmbeddingI8, EmbeddingsCache,
    SimilarityScore,
};
