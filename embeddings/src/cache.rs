//! In-memory store of text embeddings that can be queried for close matches.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::format::Embedding;
use crate::search::{SimilarityScore, find_closest_with_score};

/// Similarity threshold used by [`EmbeddingsCache::get_closest_matches`]
/// when the caller does not pass one.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

/// How cache keys are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyComparison {
    /// `"Cherryade"` and `"cherryade"` are the same key.
    #[default]
    CaseInsensitive,
    /// Keys must match exactly.
    CaseSensitive,
}

impl KeyComparison {
    /// Normalize `text` into the form used as a map key.
    pub fn key(self, text: &str) -> String {
        match self {
            KeyComparison::CaseInsensitive => text.to_lowercase(),
            KeyComparison::CaseSensitive => text.to_string(),
        }
    }
}

/// A cached text together with its similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingsCacheMatch {
    /// Text as it was first added to the cache.
    pub text: String,

    /// Similarity to the query embedding.
    pub similarity: f32,
}

#[derive(Debug, Clone)]
struct CachedEmbedding<E> {
    text: String,
    embedding: E,
}

/// A concurrent text → embedding map used as a memoization layer.
///
/// Entries are only ever added, never replaced. Search is a linear scan,
/// so this is intended for small collections.
pub struct EmbeddingsCache<E> {
    entries: DashMap<String, CachedEmbedding<E>>,
    key_comparison: KeyComparison,
}

impl<E: Embedding> EmbeddingsCache<E> {
    /// Create an empty cache with case-insensitive keys.
    pub fn new() -> Self {
        Self::with_key_comparison(KeyComparison::default())
    }

    /// Create an empty cache with the given key comparison.
    pub fn with_key_comparison(key_comparison: KeyComparison) -> Self {
        Self {
            entries: DashMap::new(),
            key_comparison,
        }
    }

    /// How this cache compares keys.
    pub fn key_comparison(&self) -> KeyComparison {
        self.key_comparison
    }

    /// Add `embedding` for `text` unless the key is already present.
    ///
    /// Returns whether the entry was inserted. Existing entries are never
    /// overwritten. The check and insert are atomic.
    pub fn try_add(&self, text: &str, embedding: E) -> bool {
        match self.entries.entry(self.key_comparison.key(text)) {
            Entry::Occupied(_) => {
                debug!("Embedding already cached, keeping existing entry");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(CachedEmbedding {
                    text: text.to_string(),
                    embedding,
                });
                true
            }
        }
    }

    /// Get the cached embedding for `text`.
    pub fn get(&self, text: &str) -> Option<E> {
        self.entries
            .get(&self.key_comparison.key(text))
            .map(|entry| entry.embedding.clone())
    }

    /// Check whether `text` is cached.
    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(&self.key_comparison.key(text))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
        info!("Cleared embeddings cache");
    }

    /// Find up to `max_results` cached texts closest to `query`, most
    /// similar first. Entries below `similarity_threshold` (default 0.5)
    /// are filtered out before ranking.
    ///
    /// Entries inserted concurrently with this call may or may not be seen.
    pub fn get_closest_matches(
        &self,
        query: &E,
        max_results: usize,
        similarity_threshold: Option<f32>,
    ) -> Result<Vec<EmbeddingsCacheMatch>> {
        let threshold = similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        let candidates = self.entries.iter().map(|entry| {
            let cached = entry.value();
            (cached.text.clone(), cached.embedding.clone())
        });

        let matches = find_closest_with_score(query, candidates, max_results, Some(threshold))?;
        Ok(matches.into_iter().map(EmbeddingsCacheMatch::from).collect())
    }
}

impl<E: Embedding> Default for EmbeddingsCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SimilarityScore<String>> for EmbeddingsCacheMatch {
    fn from(score: SimilarityScore<String>) -> Self {
        let similarity = score.similarity();
        Self {
            text: score.into_item(),
            similarity,
        }
    }
}
