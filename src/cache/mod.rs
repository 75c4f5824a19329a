//! Read-through cache for post queries.
//!
//! [`ContentCache`] wraps a [`CacheBackend`] (Redis in production, the
//! in-process [`MemoryCacheBackend`] otherwise) and never lets a backend
//! failure reach the caller: failed reads are misses, failed writes and
//! deletes are logged, and every failure triggers one reconnect attempt.

mod keys;
mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

pub use keys::{
    CacheKey, CacheKeyBuilder, KeyFragment, POST_BY_ID, POST_BY_SLUG, POSTS_LIST,
    POSTS_LIST_PATTERN, POSTS_SEARCH, POSTS_SEARCH_PATTERN, post_by_id, post_by_slug, posts_list,
    posts_search,
};
pub use store::MemoryCacheBackend;

pub const METRIC_CACHE_HIT: &str = "qubit_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "qubit_cache_miss_total";
pub const METRIC_CACHE_ERROR: &str = "qubit_cache_error_total";
pub const METRIC_CACHE_INVALIDATION: &str = "qubit_cache_invalidation_total";

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

const LOG_TARGET: &str = "qubit::cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache command failed: {0}")]
    Command(String),
}

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key matching a glob pattern, returning how many were removed.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Drop and re-establish the backend connection.
    async fn reconnect(&self) -> Result<(), CacheError>;
}

#[derive(Clone)]
pub struct ContentCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ContentCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.backend.get(key.as_str()).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    Some(value)
                }
                Err(err) => {
                    counter!(METRIC_CACHE_MISS).increment(1);
                    warn!(
                        target: LOG_TARGET,
                        key = %key,
                        error = %err,
                        "Discarding undecodable cache entry"
                    );
                    self.invalidate(key).await;
                    None
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
            Err(err) => {
                self.recover("get", key.as_str(), &err).await;
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    key = %key,
                    error = %err,
                    "Skipping cache write for unserializable value"
                );
                return;
            }
        };

        if let Err(err) = self.backend.set(key.as_str(), payload, self.ttl).await {
            self.recover("set", key.as_str(), &err).await;
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        match self.backend.delete(key.as_str()).await {
            Ok(()) => {
                counter!(METRIC_CACHE_INVALIDATION, "kind" => "key").increment(1);
                debug!(target: LOG_TARGET, key = %key, "Invalidated cache key");
            }
            Err(err) => self.recover("delete", key.as_str(), &err).await,
        }
    }

    pub async fn invalidate_matching(&self, pattern: &str) {
        match self.backend.delete_matching(pattern).await {
            Ok(removed) => {
                counter!(METRIC_CACHE_INVALIDATION, "kind" => "pattern").increment(1);
                debug!(target: LOG_TARGET, pattern, removed, "Invalidated cache pattern");
            }
            Err(err) => self.recover("delete_matching", pattern, &err).await,
        }
    }

    /// Return the cached value for `key`, or run `load` and cache a present result.
    pub async fn read_through<T, E, F, Fut>(&self, key: &CacheKey, load: F) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(Some(hit));
        }

        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.put(key, value).await;
        }
        Ok(loaded)
    }

    async fn recover(&self, op: &'static str, key: &str, err: &CacheError) {
        counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
        warn!(
            target: LOG_TARGET,
            op,
            key,
            error = %err,
            "Cache operation failed; continuing without cache"
        );

        if let Err(reconnect_err) = self.backend.reconnect().await {
            warn!(
                target: LOG_TARGET,
                op,
                error = %reconnect_err,
                "Cache reconnect failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct BrokenBackend {
        reconnects: AtomicUsize,
    }

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Command("READONLY".into()))
        }

        async fn delete_matching(&self, _pattern: &str) -> Result<u64, CacheError> {
            Err(CacheError::Command("READONLY".into()))
        }

        async fn reconnect(&self) -> Result<(), CacheError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("still down".into()))
        }
    }

    fn memory_cache() -> ContentCache {
        let backend = MemoryCacheBackend::new(NonZeroUsize::new(16).expect("non-zero"));
        ContentCache::new(Arc::new(backend), DEFAULT_TTL)
    }

    #[tokio::test]
    async fn read_through_loads_once_then_hits() {
        let cache = memory_cache();
        let key = post_by_slug("hello");
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .read_through(&key, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(Some("body".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some("body"));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_results_are_not_cached() {
        let cache = memory_cache();
        let key = post_by_slug("missing");
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Option<String> = cache
                .read_through(&key, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(None)
                })
                .await
                .unwrap();
            assert!(value.is_none());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loader_errors_propagate_and_are_not_cached() {
        let cache = memory_cache();
        let key = post_by_slug("flaky");

        let result: Result<Option<String>, &str> =
            cache.read_through(&key, || async { Err("db down") }).await;
        assert_eq!(result, Err("db down"));
        assert!(cache.get::<String>(&key).await.is_none());
    }

    #[tokio::test]
    async fn backend_failures_degrade_to_loader_and_reconnect() {
        let backend = Arc::new(BrokenBackend::default());
        let cache = ContentCache::new(backend.clone(), DEFAULT_TTL);
        let key = post_by_slug("hello");

        let value = cache
            .read_through(&key, || async {
                Ok::<_, std::convert::Infallible>(Some(42_u32))
            })
            .await
            .unwrap();
        cache.invalidate(&key).await;
        cache.invalidate_matching(POSTS_LIST_PATTERN).await;

        assert_eq!(value, Some(42));
        // get + set + delete + delete_matching each reconnect once.
        assert_eq!(backend.reconnects.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn undecodable_entries_are_dropped() {
        let backend = Arc::new(MemoryCacheBackend::new(
            NonZeroUsize::new(4).expect("non-zero"),
        ));
        backend
            .set("post-by-slug:bad", "not json".to_string(), DEFAULT_TTL)
            .await
            .unwrap();
        let cache = ContentCache::new(backend.clone(), DEFAULT_TTL);

        assert!(cache.get::<u32>(&post_by_slug("bad")).await.is_none());
        assert!(backend.is_empty());
    }
}
