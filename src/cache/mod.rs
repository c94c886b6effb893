//! Short-lived result cache.
//!
//! Memoizes values by key for a TTL to bound the upstream call rate. Entries
//! are never purged in the background: an expired entry stays readable through
//! [`ResultCache::peek`] until it is overwritten or invalidated.

use crate::aggregate::AggregateReport;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache of aggregate reports keyed by group.
pub type ReportCache = ResultCache<AggregateReport>;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// TTL cache shared across requests.
///
/// The lock is never held while computing a value, so concurrent misses for
/// the same key may compute twice; the last store wins.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the fresh value for `key`, or compute and store a new one.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.fresh(key, ttl).await {
            return value;
        }

        let value = compute().await;
        self.put(key, value.clone()).await;
        value
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but a failed
    /// computation stores nothing and returns the error.
    pub async fn get_or_try_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.fresh(key, ttl).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.put(key, value.clone()).await;
        Ok(value)
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub async fn put(&self, key: &str, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Last stored value and its age, regardless of TTL.
    pub async fn peek(&self, key: &str) -> Option<(V, Duration)> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|e| (e.value.clone(), e.stored_at.elapsed()))
    }

    /// Force-evict `key`. Returns whether an entry was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn fresh(&self, key: &str, ttl: Duration) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < ttl)
            .map(|e| e.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(30);

    async fn counted(cache: &ResultCache<usize>, calls: &AtomicUsize) -> usize {
        cache
            .get_or_compute("network", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst) + 1
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_computes_once_within_ttl() {
        let cache = ResultCache::new();
        let calls = AtomicUsize::new(0);

        assert_eq!(counted(&cache, &calls).await, 1);
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(counted(&cache, &calls).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recomputes_after_ttl() {
        let cache = ResultCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &calls).await;
        tokio::time::advance(TTL).await;
        assert_eq!(counted(&cache, &calls).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache = ResultCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &calls).await;
        assert!(cache.invalidate("network").await);
        assert!(!cache.invalidate("network").await);
        assert_eq!(counted(&cache, &calls).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_returns_stale_entries() {
        let cache = ResultCache::new();
        cache.put("ai-services", 7usize).await;
        tokio::time::advance(Duration::from_secs(120)).await;

        let (value, age) = cache.peek("ai-services").await.unwrap();
        assert_eq!(value, 7);
        assert!(age >= Duration::from_secs(120));
        assert!(cache.peek("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_failed_compute_stores_nothing() {
        let cache: ResultCache<usize> = ResultCache::new();
        let result: Result<usize, &str> = cache
            .get_or_try_compute("network", TTL, || async { Err("boom") })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.len().await, 0);

        let result: Result<usize, &str> = cache
            .get_or_try_compute("network", TTL, || async { Ok(3) })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(cache.keys().await, vec!["network".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = Arc::new(ResultCache::new());
        let mut handles = Vec::new();
        for i in 0..16usize {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("k{}", i % 4);
                cache.get_or_compute(&key, TTL, || async move { i }).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len().await, 4);
    }
}
