//! Embedding store with sliding expiration.

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use textsim_embeddings::{Embedding, KeyComparison};
use tokio::time::Instant;
use tracing::{debug, info};

struct Slot<E> {
    embedding: E,
    last_access: Instant,
}

impl<E> Slot<E> {
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_access) >= window
    }
}

/// A concurrent text → embedding map whose entries expire after a period
/// without access.
///
/// Every successful lookup restarts an entry's window. Expired entries are
/// dropped when looked up, and a full sweep runs at most once per window
/// during inserts, so memory is bounded by the number of distinct texts
/// used within one window.
pub struct ExpiringStore<E> {
    entries: DashMap<String, Slot<E>>,
    sliding_expiration: Duration,
    key_comparison: KeyComparison,
    last_sweep: Mutex<Instant>,
}

impl<E: Embedding> ExpiringStore<E> {
    /// Create an empty store.
    pub fn new(sliding_expiration: Duration, key_comparison: KeyComparison) -> Self {
        Self {
            entries: DashMap::new(),
            sliding_expiration,
            key_comparison,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// The sliding expiration window.
    pub fn sliding_expiration(&self) -> Duration {
        self.sliding_expiration
    }

    /// Look up `text`, restarting its expiration window on a hit.
    pub fn get(&self, text: &str) -> Option<E> {
        let key = self.key_comparison.key(text);
        let now = Instant::now();

        if let Some(mut slot) = self.entries.get_mut(&key) {
            if !slot.is_expired(now, self.sliding_expiration) {
                slot.last_access = now;
                return Some(slot.embedding.clone());
            }
        } else {
            return None;
        }

        let window = self.sliding_expiration;
        if self
            .entries
            .remove_if(&key, |_, slot| slot.is_expired(now, window))
            .is_some()
        {
            debug!("Dropped expired embedding on lookup");
        }
        None
    }

    /// Whether `text` has a live entry. Unlike [`ExpiringStore::get`] this
    /// does not restart the entry's window.
    pub fn contains(&self, text: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(&self.key_comparison.key(text))
            .is_some_and(|slot| !slot.is_expired(now, self.sliding_expiration))
    }

    /// Store `embedding` for `text` unless a live entry already exists.
    ///
    /// Returns the embedding now held for `text`, which is the existing one
    /// when another caller got there first.
    pub fn insert(&self, text: &str, embedding: E) -> E {
        let now = Instant::now();
        let stored = match self.entries.entry(self.key_comparison.key(text)) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.is_expired(now, self.sliding_expiration) {
                    slot.embedding = embedding;
                }
                slot.last_access = now;
                slot.embedding.clone()
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    embedding: embedding.clone(),
                    last_access: now,
                });
                embedding
            }
        };

        self.maybe_sweep(now);
        stored
    }

    /// Drop every expired entry now.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        if let Ok(mut last_sweep) = self.last_sweep.lock() {
            *last_sweep = now;
        }
        self.sweep(now)
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
        info!("Cleared expiring embedding store");
    }

    fn maybe_sweep(&self, now: Instant) {
        {
            let Ok(mut last_sweep) = self.last_sweep.lock() else {
                return;
            };
            if now.saturating_duration_since(*last_sweep) < self.sliding_expiration {
                return;
            }
            *last_sweep = now;
        }
        self.sweep(now);
    }

    fn sweep(&self, now: Instant) -> usize {
        let window = self.sliding_expiration;
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(now, window));
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            info!("Evicted {evicted} expired embeddings");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use textsim_embeddings::EmbeddingF32;

    const WINDOW: Duration = Duration::from_secs(300);

    fn embedding(x: f32) -> EmbeddingF32 {
        EmbeddingF32::quantize(&[x, 1.0]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_window() {
        let store = ExpiringStore::new(WINDOW, KeyComparison::CaseSensitive);
        store.insert("tea", embedding(1.0));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.get("tea").is_some());

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(store.get("tea").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_slides_the_window() {
        let store = ExpiringStore::new(WINDOW, KeyComparison::CaseSensitive);
        store.insert("tea", embedding(1.0));

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(200)).await;
            assert!(store.get("tea").is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_contains_does_not_slide_the_window() {
        let store = ExpiringStore::new(WINDOW, KeyComparison::CaseSensitive);
        store.insert("tea", embedding(1.0));

        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(store.contains("tea"));
        assert!(!store.contains("coffee"));

        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(!store.contains("tea"));
        assert!(store.get("tea").is_none());
    }

    #[test]
    fn test_concurrent_inserts_keep_one_winner() {
        let store = std::sync::Arc::new(ExpiringStore::<EmbeddingF32>::new(
            WINDOW,
            KeyComparison::CaseSensitive,
        ));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.insert("shared", embedding(i as f32)))
            })
            .collect();

        let stored: Vec<EmbeddingF32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(stored.iter().all(|e| *e == stored[0]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("shared"), Some(stored[0].clone()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_keeps_live_entry() {
        let store = ExpiringStore::new(WINDOW, KeyComparison::CaseSensitive);
        let first = embedding(1.0);

        assert_eq!(store.insert("tea", first.clone()), first);
        assert_eq!(store.insert("tea", embedding(2.0)), first);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_stale_entries() {
        let store = ExpiringStore::new(WINDOW, KeyComparison::CaseSensitive);
        store.insert("tea", embedding(1.0));
        store.insert("coffee", embedding(2.0));

        tokio::time::advance(Duration::from_secs(301)).await;
        store.insert("latte", embedding(3.0));

        assert_eq!(store.len(), 1);
        assert!(store.get("latte").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_reports_count() {
        let store = ExpiringStore::new(WINDOW, KeyComparison::CaseInsensitive);
        store.insert("Tea", embedding(1.0));
        assert!(store.get("TEA").is_some());

        tokio::time::advance(WINDOW).await;
        assert_eq!(store.purge_expired(), 1);
    }
}
