//! Matching free text against candidate strings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use textsim_embeddings::{Embedding, EmbeddingF32};
use tracing::{debug, info};

use crate::config::{CacheConfig, MatcherConfig};
use crate::embedder::LocalEmbedder;
use crate::encoder::TextEncoder;
use crate::error::Result;
use crate::expiring::ExpiringStore;

/// A candidate that passed the similarity threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// The candidate text, as supplied.
    pub text: String,

    /// Similarity to the target.
    pub similarity: f32,
}

/// Trait for ranking candidate strings by similarity to a target string.
#[async_trait]
pub trait SimilarityMatcher: Send + Sync {
    /// Every candidate at least `similarity_threshold` similar to `target`,
    /// most similar first. `None` uses the implementation's default.
    async fn find_closest(
        &self,
        target: &str,
        candidates: &[String],
        similarity_threshold: Option<f32>,
    ) -> Result<Vec<SimilarityResult>>;
}

/// Similarity matcher that memoizes candidate embeddings for a sliding
/// window.
///
/// Candidate lists tend to repeat between calls, targets do not, so only
/// candidates are cached.
pub struct LocalEmbeddingsCache<P, E = EmbeddingF32> {
    embedder: LocalEmbedder<P>,
    store: ExpiringStore<E>,
    similarity_threshold: f32,
}

impl<P: TextEncoder, E: Embedding> LocalEmbeddingsCache<P, E> {
    /// Create a cache with default settings.
    pub fn new(embedder: LocalEmbedder<P>) -> Self {
        Self::with_cache_config(embedder, &CacheConfig::default())
    }

    /// Create the embedder and cache from a full configuration.
    pub fn with_config(encoder: P, config: &MatcherConfig) -> Self {
        Self::with_cache_config(
            LocalEmbedder::with_config(encoder, &config.embedder),
            &config.cache,
        )
    }

    /// Create a cache around an existing embedder.
    pub fn with_cache_config(embedder: LocalEmbedder<P>, config: &CacheConfig) -> Self {
        info!(
            "Creating {} embeddings cache with {}s sliding expiration",
            E::FORMAT,
            config.sliding_expiration_secs
        );
        Self {
            embedder,
            store: ExpiringStore::new(config.sliding_expiration(), config.key_comparison()),
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// The embedder used for targets and candidates.
    pub fn embedder(&self) -> &LocalEmbedder<P> {
        &self.embedder
    }

    /// Number of cached candidate embeddings.
    pub fn cached_len(&self) -> usize {
        self.store.len()
    }

    /// Whether `text` currently has a live cached embedding. Checking does
    /// not extend the entry's lifetime.
    pub fn is_cached(&self, text: &str) -> bool {
        self.store.contains(text)
    }

    /// Drop every cached embedding.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Rank `candidates` by similarity to `target`.
    ///
    /// Candidates below the threshold are dropped before sorting. The result
    /// is not truncated; equal scores keep candidate order.
    pub async fn find_closest<I, S>(
        &self,
        target: &str,
        candidates: I,
        similarity_threshold: Option<f32>,
    ) -> Result<Vec<SimilarityResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let threshold = similarity_threshold.unwrap_or(self.similarity_threshold);
        let target_embedding: E = self.embedder.embed(target).await?;

        let mut results = Vec::new();
        for candidate in candidates {
            let candidate = candidate.as_ref();
            let embedding = self.get_or_embed(candidate).await?;
            let similarity = target_embedding.similarity(&embedding)?;
            if similarity >= threshold {
                results.push(SimilarityResult {
                    text: candidate.to_string(),
                    similarity,
                });
            }
        }

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        debug!("{} candidates passed threshold {threshold}", results.len());
        Ok(results)
    }

    async fn get_or_embed(&self, text: &str) -> Result<E> {
        if let Some(embedding) = self.store.get(text) {
            debug!("Candidate embedding cache hit");
            return Ok(embedding);
        }

        debug!("Candidate embedding cache miss");
        let embedding = self.embedder.embed(text).await?;
        Ok(self.store.insert(text, embedding))
    }
}

#[async_trait]
impl<P: TextEncoder, E: Embedding> SimilarityMatcher for LocalEmbeddingsCache<P, E> {
    async fn find_closest(
        &self,
        target: &str,
        candidates: &[String],
        similarity_threshold: Option<f32>,
    ) -> Result<Vec<SimilarityResult>> {
        LocalEmbeddingsCache::find_closest(self, target, candidates, similarity_threshold).await
    }
}
