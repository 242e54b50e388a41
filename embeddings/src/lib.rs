//! # Embeddings
//!
//! Compact text embeddings and nearest-neighbour search for small,
//! in-memory collections.
//!
//! ## Features
//!
//! - **Three storage formats**: full `f32`, scaled `i8` with a stored
//!   magnitude, and one bit per dimension
//! - **Quantization**: saturating int8 scaling and sign binarization
//! - **Similarity**: cosine for float/int8, normalized Hamming for bits
//! - **Top-k search**: single pass over a lazily produced candidate stream
//! - **Caching**: concurrent text → embedding memoization
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings Core                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  raw f32 ──► quantize ──► Embedding ──► similarity             │
//! │                              │              │                   │
//! │                              ▼              ▼                   │
//! │                      EmbeddingsCache ──► find_closest          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate spawns threads or awaits. Embeddings are
//! immutable, so they can be compared from many threads at once.

pub mod bit;
pub mod cache;
pub mod error;
pub mod float;
pub mod format;
pub mod int8;
pub mod quantize;
pub mod search;
pub mod similarity;

pub use bit::EmbeddingI1;
pub use cache::{DEFAULT_SIMILARITY_THRESHOLD, EmbeddingsCache, EmbeddingsCacheMatch, KeyComparison};
pub use error::{EmbeddingError, Result};
pub use float::EmbeddingF32;
pub use format::{Embedding, EmbeddingFormat};
pub use int8::EmbeddingI8;
pub use search::{SimilarityScore, find_closest, find_closest_with_score};
pub use similarity::cosine_similarity;

/// Dimension of the reference sentence embedding model.
pub const DEFAULT_DIMENSION: usize = 384; // all-MiniLM-L6-v2
