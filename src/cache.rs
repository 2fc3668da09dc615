//! In-memory TTL cache for composed answers.
//!
//! Keys are trimmed question strings; casing and inner whitespace are
//! preserved, so "What is X?" and "what is x?" are distinct entries.
//! Entries expire a fixed interval after insertion. A hit never
//! extends the lifetime, so a cached answer can be at most one TTL
//! stale relative to the index.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::Answer;

struct Entry {
    answer: Answer,
    inserted_at: Instant,
}

/// Answer cache shared across request handlers. Interior mutability
/// via a `Mutex`; the lock is never held across an await.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a fresh entry for `question`. Expired entries behave as
    /// absent.
    pub fn get(&self, question: &str) -> Option<Answer> {
        let key = question.trim();
        let entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                debug!(%key, "cache hit");
                Some(entry.answer.clone())
            }
            _ => None,
        }
    }

    /// Insert (or replace) the entry for `question`, resetting its
    /// lifetime. Expired entries are swept opportunistically so the
    /// map does not grow without bound.
    pub fn store(&self, question: &str, answer: Answer) {
        let key = question.trim().to_string();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        entries.insert(
            key,
            Entry {
                answer,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Return the cached answer for `question`, or run `compute` and
    /// cache its result. The computation runs outside the lock, so two
    /// concurrent misses for the same question may both compute; the
    /// later store wins, which is harmless for deterministic answers.
    pub async fn get_or_compute<F, Fut>(&self, question: &str, compute: F) -> Answer
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Answer>,
    {
        if let Some(hit) = self.get(question) {
            return hit;
        }
        let answer = compute().await;
        self.store(question, answer.clone());
        answer
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> Answer {
        Answer {
            answer: text.to_string(),
            sources: Vec::new(),
        }
    }

    #[test]
    fn test_store_and_get() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.store("What is X?", answer("X is a thing."));
        assert_eq!(cache.get("What is X?").unwrap().answer, "X is a thing.");
    }

    #[test]
    fn test_keys_are_trimmed_only() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.store("  What is X?  ", answer("trimmed"));
        assert!(cache.get("What is X?").is_some());
        // Casing stays significant.
        assert!(cache.get("what is x?").is_none());
    }

    #[test]
    fn test_entries_expire() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        cache.store("q", answer("a"));
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn test_hit_does_not_extend_lifetime() {
        let cache = ResponseCache::new(Duration::from_millis(40));
        cache.store("q", answer("a"));
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get("q").is_some());
        std::thread::sleep(Duration::from_millis(25));
        // 50ms since insertion: the earlier hit must not have reset the clock.
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn test_expired_entries_swept_on_store() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        cache.store("old", answer("a"));
        std::thread::sleep(Duration::from_millis(25));
        cache.store("new", answer("b"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_caches_result() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let first = cache
            .get_or_compute("q", || async { answer("computed") })
            .await;
        assert_eq!(first.answer, "computed");

        // Second call must be served from cache, not the closure.
        let second = cache
            .get_or_compute("q", || async { answer("recomputed") })
            .await;
        assert_eq!(second.answer, "computed");
    }

    #[tokio::test]
    async fn test_get_or_compute_recomputes_after_expiry() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = ResponseCache::new(Duration::from_millis(30));
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            answer("a")
        };

        for _ in 0..3 {
            cache.get_or_compute("q", || async { compute() }).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "hits within TTL must not recompute");

        tokio::time::sleep(Duration::from_millis(45)).await;
        cache.get_or_compute("q", || async { compute() }).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "expired entry must recompute");
    }
}
