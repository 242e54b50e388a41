//! Text to embedding conversion.

use std::cell::RefCell;
use std::sync::Arc;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use textsim_embeddings::{Embedding, SimilarityScore, find_closest_with_score};
use tracing::debug;

use crate::config::{DEFAULT_MAX_TOKENS, EmbedderConfig};
use crate::encoder::TextEncoder;
use crate::error::{Result, RetrievalError};

thread_local! {
    /// Accumulator for mean-pooling token rows. Cleared around every use
    /// so no values leak between calls.
    static POOL_SCRATCH: RefCell<Vec<f32>> = const { RefCell::new(Vec::new()) };
}

/// A text query for [`LocalEmbedder::find_closest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityQuery {
    /// Text to search for.
    pub search_text: String,

    /// Upper bound on the number of results.
    pub max_results: usize,

    /// Lower bound on similarity for returned results.
    pub min_similarity: Option<f32>,
}

impl SimilarityQuery {
    /// Create a query with no similarity floor.
    pub fn new(search_text: impl Into<String>, max_results: usize) -> Self {
        Self {
            search_text: search_text.into(),
            max_results,
            min_similarity: None,
        }
    }

    /// Only return results at least this similar.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }
}

/// Combines a [`TextEncoder`] with quantization into any embedding format.
pub struct LocalEmbedder<P> {
    encoder: Arc<P>,
    max_tokens: usize,
}

impl<P> Clone for LocalEmbedder<P> {
    fn clone(&self) -> Self {
        Self {
            encoder: Arc::clone(&self.encoder),
            max_tokens: self.max_tokens,
        }
    }
}

impl<P: TextEncoder> LocalEmbedder<P> {
    /// Create an embedder with the default token budget.
    pub fn new(encoder: P) -> Self {
        Self::from_shared(Arc::new(encoder))
    }

    /// Create an embedder around an encoder that is shared elsewhere.
    pub fn from_shared(encoder: Arc<P>) -> Self {
        Self {
            encoder,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create an embedder from configuration.
    pub fn with_config(encoder: P, config: &EmbedderConfig) -> Self {
        Self::new(encoder).with_max_tokens(config.max_tokens)
    }

    /// Set the token budget passed to the encoder.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The underlying encoder.
    pub fn encoder(&self) -> &P {
        &self.encoder
    }

    /// Number of dimensions of every embedding produced.
    pub fn dimensions(&self) -> usize {
        self.encoder.dimensions()
    }

    /// Embed `text` in format `E`, allocating a new buffer.
    pub async fn embed<E: Embedding>(&self, text: &str) -> Result<E> {
        let len = E::buffer_len(self.dimensions())?;
        self.embed_into(text, BytesMut::zeroed(len)).await
    }

    /// Embed `text` in format `E`, writing into a caller-supplied buffer of
    /// exactly `E::buffer_len(dimensions)` bytes.
    pub async fn embed_into<E: Embedding>(&self, text: &str, buffer: BytesMut) -> Result<E> {
        let output = self.encoder.encode(text, self.max_tokens).await?;
        debug!(
            "Encoder {} returned {} values for {} embedding",
            self.encoder.name(),
            output.len(),
            E::FORMAT
        );
        pool_into(&output, self.dimensions(), buffer)
    }

    /// Embed every text, keeping each text next to its embedding.
    pub async fn embed_range<E, I, S>(&self, texts: I) -> Result<Vec<(String, E)>>
    where
        E: Embedding,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut embedded = Vec::new();
        for text in texts {
            let text = text.into();
            let embedding = self.embed(&text).await?;
            embedded.push((text, embedding));
        }
        Ok(embedded)
    }

    /// Embed arbitrary items through a text projection.
    pub async fn embed_range_by<T, E, I, F>(&self, items: I, text_of: F) -> Result<Vec<(T, E)>>
    where
        E: Embedding,
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> &str,
    {
        let mut embedded = Vec::new();
        for item in items {
            let embedding = self.embed(text_of(&item)).await?;
            embedded.push((item, embedding));
        }
        Ok(embedded)
    }

    /// Embed the query text, then return the closest candidate items.
    pub async fn find_closest<T, E, B, I>(&self, query: &SimilarityQuery, candidates: I) -> Result<Vec<T>>
    where
        E: Embedding,
        B: std::borrow::Borrow<E>,
        I: IntoIterator<Item = (T, B)>,
    {
        Ok(self
            .find_closest_with_score(query, candidates)
            .await?
            .into_iter()
            .map(SimilarityScore::into_item)
            .collect())
    }

    /// Embed the query text, then return the closest candidates with their
    /// similarity scores.
    pub async fn find_closest_with_score<T, E, B, I>(
        &self,
        query: &SimilarityQuery,
        candidates: I,
    ) -> Result<Vec<SimilarityScore<T>>>
    where
        E: Embedding,
        B: std::borrow::Borrow<E>,
        I: IntoIterator<Item = (T, B)>,
    {
        let target: E = self.embed(&query.search_text).await?;
        Ok(find_closest_with_score(
            &target,
            candidates,
            query.max_results,
            query.min_similarity,
        )?)
    }
}

/// Mean-pool token-major encoder output into one vector, then convert it.
///
/// `output` must hold one row (already pooled) or a whole number of rows
/// of `dimensions` values.
pub fn pool_into<E: Embedding>(output: &[f32], dimensions: usize, buffer: BytesMut) -> Result<E> {
    if dimensions == 0 || output.is_empty() || output.len() % dimensions != 0 {
        return Err(RetrievalError::EncoderOutput {
            length: output.len(),
            dimensions,
        });
    }
    if output.len() == dimensions {
        return Ok(E::from_model_output(output, buffer)?);
    }

    POOL_SCRATCH.with(|scratch| {
        let mut scratch = scratch.borrow_mut();
        scratch.clear();
        scratch.resize(dimensions, 0.0);

        let rows = output.chunks_exact(dimensions);
        let row_count = rows.len() as f32;
        for row in rows {
            for (acc, value) in scratch.iter_mut().zip(row) {
                *acc += value;
            }
        }
        for acc in scratch.iter_mut() {
            *acc /= row_count;
        }

        let pooled = E::from_model_output(&scratch, buffer);
        scratch.clear();
        Ok(pooled?)
    })
}
