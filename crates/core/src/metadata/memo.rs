//! Read-through memoization primitive used by the metadata cache.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// One cached value plus the instant it was fetched.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
}

/// A keyed read-through cache with per-key fetch locks.
///
/// The first lookup for a key runs the fetch closure and stores whatever it
/// returns, including negative results ("not found" is a value, so a failing
/// lookup is not repeated on every call). Concurrent lookups for the same
/// key block on a per-key lock and reuse the single in-flight fetch.
/// Entries never expire on their own; they live until [`Memo::clear`].
pub struct Memo<K, V> {
    slots: Mutex<HashMap<K, Arc<tokio::sync::Mutex<Option<Entry<V>>>>>>,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Memo {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, running `fetch` at most once per
    /// key across concurrent callers.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slots
                .entry(key)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
                .clone()
        };

        let mut guard = slot.lock().await;
        if let Some(entry) = guard.as_ref() {
            return entry.value.clone();
        }

        let value = fetch().await;
        *guard = Some(Entry {
            value: value.clone(),
            fetched_at: Utc::now(),
        });
        value
    }

    /// When the entry for `key` was fetched, if it is populated.
    pub fn fetched_at(&self, key: &K) -> Option<DateTime<Utc>> {
        let slots = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(key)?.clone();
        drop(slots);
        slot.try_lock().ok()?.as_ref().map(|e| e.fetched_at)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of keys with a slot (populated or in flight).
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fetches_once_per_key() {
        let memo: Memo<String, i32> = Memo::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo
                .get_or_fetch("a".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    42
                })
                .await;
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn test_negative_result_is_cached() {
        let memo: Memo<i64, Option<String>> = Memo::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = memo
                .get_or_fetch(7, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    None
                })
                .await;
            assert_eq!(value, None);
        }

        // The "not found" answer came from the cache the second time.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let memo: Memo<&'static str, i32> = Memo::new();
        let calls = AtomicUsize::new(0);

        memo.get_or_fetch("k", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            1
        })
        .await;

        memo.clear();
        assert!(memo.is_empty());

        let value = memo
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                2
            })
            .await;

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_fetch() {
        let memo: Arc<Memo<&'static str, i32>> = Arc::new(Memo::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let memo = memo.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                memo.get_or_fetch("shared", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    99
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetched_at_recorded() {
        let memo: Memo<&'static str, i32> = Memo::new();
        assert!(memo.fetched_at(&"k").is_none());

        memo.get_or_fetch("k", || async { 5 }).await;
        assert!(memo.fetched_at(&"k").is_some());
    }
}
