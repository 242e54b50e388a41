//! Bounded top-k nearest neighbour search by linear scan.

use std::borrow::Borrow;
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeSet;

use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::debug;

use crate::error::{EmbeddingError, Result};
use crate::format::Embedding;

/// A candidate paired with its similarity to the search target.
///
/// Scores are ordered by similarity, highest first. Equal similarities are
/// ordered by arrival, earliest first, so no two scores from one search
/// ever compare equal.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityScore<T> {
    similarity: f32,
    item: T,
    #[serde(skip)]
    sequence: u64,
}

impl<T> SimilarityScore<T> {
    /// Similarity score; higher is more similar.
    pub fn similarity(&self) -> f32 {
        self.similarity
    }

    /// The matched candidate.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Take the matched candidate.
    pub fn into_item(self) -> T {
        self.item
    }

    fn rank(&self) -> (Reverse<OrderedFloat<f32>>, u64) {
        (Reverse(OrderedFloat(self.similarity)), self.sequence)
    }
}

impl<T> PartialEq for SimilarityScore<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl<T> Eq for SimilarityScore<T> {}

impl<T> PartialOrd for SimilarityScore<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for SimilarityScore<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Find the `max_results` candidates most similar to `target`.
///
/// Returns the candidate items, most similar first. See
/// [`find_closest_with_score`].
pub fn find_closest<T, E, B, I>(
    target: &E,
    candidates: I,
    max_results: usize,
    min_similarity: Option<f32>,
) -> Result<Vec<T>>
where
    E: Embedding,
    B: Borrow<E>,
    I: IntoIterator<Item = (T, B)>,
{
    Ok(
        find_closest_with_score(target, candidates, max_results, min_similarity)?
            .into_iter()
            .map(SimilarityScore::into_item)
            .collect(),
    )
}

/// Find the `max_results` candidates most similar to `target`, keeping
/// their similarity scores.
///
/// The candidate sequence is consumed exactly once, so lazily produced
/// sequences work. Only candidates with `similarity >= min_similarity`
/// are returned. Cost is `O(C log K)` for `C` candidates.
pub fn find_closest_with_score<T, E, B, I>(
    target: &E,
    candidates: I,
    max_results: usize,
    min_similarity: Option<f32>,
) -> Result<Vec<SimilarityScore<T>>>
where
    E: Embedding,
    B: Borrow<E>,
    I: IntoIterator<Item = (T, B)>,
{
    if max_results == 0 {
        return Err(EmbeddingError::InvalidMaxResults);
    }
    let min_similarity = min_similarity.unwrap_or(f32::NEG_INFINITY);

    let mut top: BTreeSet<SimilarityScore<T>> = BTreeSet::new();
    let mut candidates = candidates.into_iter();
    let mut sequence = 0u64;
    let mut scanned = 0usize;

    while top.len() < max_results {
        let Some((item, embedding)) = candidates.next() else {
            break;
        };
        scanned += 1;
        let similarity = target.similarity(embedding.borrow())?;
        if similarity >= min_similarity {
            top.insert(SimilarityScore {
                similarity,
                item,
                sequence,
            });
            sequence += 1;
        }
    }

    // The set is full here. Its worst entry already passed the threshold,
    // so beating the worst entry implies passing it too.
    for (item, embedding) in candidates {
        scanned += 1;
        let similarity = target.similarity(embedding.borrow())?;
        if top.last().is_some_and(|worst| similarity > worst.similarity) {
            top.pop_last();
            top.insert(SimilarityScore {
                similarity,
                item,
                sequence,
            });
            sequence += 1;
        }
    }

    debug!(
        "Top-k search over {scanned} {} candidates kept {}",
        E::FORMAT,
        top.len()
    );
    Ok(top.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmbeddingF32, EmbeddingI1, EmbeddingI8};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// Small deterministic generator so the tests need no extra crates.
    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        }

        fn vector(&mut self, len: usize) -> Vec<f32> {
            (0..len).map(|_| self.next_f32()).collect()
        }
    }

    fn brute_force<E: Embedding>(target: &E, candidates: &[(usize, E)], k: usize) -> Vec<usize> {
        let mut scored: Vec<(f32, usize)> = candidates
            .iter()
            .map(|(id, e)| (target.similarity(e).unwrap(), *id))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().take(k).map(|(_, id)| id).collect()
    }

    fn check_against_brute_force<E: Embedding>() {
        let mut rng = Lcg(7);
        let target = E::quantize(&rng.vector(64)).unwrap();
        let candidates: Vec<(usize, E)> = (0..200)
            .map(|id| (id, E::quantize(&rng.vector(64)).unwrap()))
            .collect();

        for k in [1, 5, 17, 200] {
            let found = find_closest(&target, candidates.iter().map(|(id, e)| (*id, e)), k, None)
                .unwrap();
            assert_eq!(found, brute_force(&target, &candidates, k), "k = {k}");
        }
    }

    #[test]
    fn test_matches_brute_force_float() {
        check_against_brute_force::<EmbeddingF32>();
    }

    #[test]
    fn test_matches_brute_force_int8() {
        check_against_brute_force::<EmbeddingI8>();
    }

    #[test]
    fn test_matches_brute_force_bit() {
        check_against_brute_force::<EmbeddingI1>();
    }

    #[test]
    fn test_results_are_descending_and_bounded() {
        let target = EmbeddingF32::quantize(&[1.0, 0.0, 0.0]).unwrap();
        let candidates = vec![
            ("b", EmbeddingF32::quantize(&[0.0, 1.0, 0.0]).unwrap()),
            ("a", EmbeddingF32::quantize(&[1.0, 0.0, 0.0]).unwrap()),
            ("c", EmbeddingF32::quantize(&[0.7, 0.7, 0.0]).unwrap()),
            ("d", EmbeddingF32::quantize(&[-1.0, 0.0, 0.0]).unwrap()),
        ];

        let results = find_closest_with_score(&target, candidates, 2, None).unwrap();
        let items: Vec<_> = results.iter().map(|r| *r.item()).collect();
        assert_eq!(items, vec!["a", "c"]);
        assert!(results[0].similarity() >= results[1].similarity());
    }

    #[test]
    fn test_threshold_filters_results() {
        let target = EmbeddingF32::quantize(&[1.0, 0.0]).unwrap();
        let candidates = vec![
            ("same", EmbeddingF32::quantize(&[1.0, 0.0]).unwrap()),
            ("near", EmbeddingF32::quantize(&[0.9, 0.1]).unwrap()),
            ("far", EmbeddingF32::quantize(&[0.0, 1.0]).unwrap()),
            ("away", EmbeddingF32::quantize(&[-1.0, 0.2]).unwrap()),
        ];

        let results = find_closest_with_score(&target, candidates, 10, Some(0.5)).unwrap();
        assert!(results.iter().all(|r| r.similarity() >= 0.5));
        let items: Vec<_> = results.into_iter().map(SimilarityScore::into_item).collect();
        assert_eq!(items, vec!["same", "near"]);
    }

    #[test]
    fn test_threshold_rejects_everything() {
        let target = EmbeddingF32::quantize(&[1.0, 0.0]).unwrap();
        let candidates = vec![("far", EmbeddingF32::quantize(&[0.0, 1.0]).unwrap())];
        let results = find_closest(&target, candidates, 3, Some(0.9)).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_zero_max_results_is_rejected() {
        let target = EmbeddingF32::quantize(&[1.0]).unwrap();
        let candidates: Vec<(u8, EmbeddingF32)> = Vec::new();
        assert_eq!(
            find_closest(&target, candidates, 0, None).unwrap_err(),
            EmbeddingError::InvalidMaxResults
        );
    }

    #[test]
    fn test_empty_candidates() {
        let target = EmbeddingI8::quantize(&[1.0; 8]).unwrap();
        let candidates: Vec<(u8, EmbeddingI8)> = Vec::new();
        assert!(find_closest(&target, candidates, 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_equal_similarities_are_all_kept() {
        let target = EmbeddingF32::quantize(&[1.0, 0.0]).unwrap();
        let same = EmbeddingF32::quantize(&[1.0, 0.0]).unwrap();
        let candidates: Vec<_> = (0..5).map(|i| (i, same.clone())).collect();

        let results = find_closest(&target, candidates, 3, None).unwrap();
        // Earlier arrivals win ties and later equal scores never evict them.
        assert_eq!(results, vec![0, 1, 2]);
    }

    #[test]
    fn test_consumes_lazy_sequence_once() {
        let target = EmbeddingF32::quantize(&[1.0, 0.0]).unwrap();
        let produced = Cell::new(0);
        let lazy = (0..50).map(|i| {
            produced.set(produced.get() + 1);
            let angle = i as f32 * 0.05;
            (i, EmbeddingF32::quantize(&[angle.cos(), angle.sin()]).unwrap())
        });

        let results = find_closest(&target, lazy, 3, None).unwrap();
        assert_eq!(results, vec![0, 1, 2]);
        assert_eq!(produced.get(), 50);
    }

    #[test]
    fn test_dimension_mismatch_propagates() {
        let target = EmbeddingF32::quantize(&[1.0, 0.0]).unwrap();
        let candidates = vec![("bad", EmbeddingF32::quantize(&[1.0, 0.0, 0.0]).unwrap())];
        assert!(matches!(
            find_closest(&target, candidates, 1, None),
            Err(EmbeddingError::DimensionMismatch { .. })
        ));
    }
}
