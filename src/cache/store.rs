//! In-process cache backend.
//!
//! Used when no Redis URL is configured and by tests. Entries expire lazily
//! on access and the least recently used entry is evicted at capacity.

use std::num::NonZeroUsize;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tracing::warn;

use super::{CacheBackend, CacheError};

const SOURCE: &str = "cache::store";

struct Entry {
    value: String,
    expires_at: Instant,
}

pub struct MemoryCacheBackend {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryCacheBackend {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.write("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, LruCache<String, Entry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    target_module = SOURCE,
                    lock_kind = "rwlock.write",
                    result = "poisoned_recovered",
                    "Recovered from poisoned cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.write("get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.write("set").put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.write("delete").pop(key);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = self.write("delete_matching");
        let matched: Vec<String> = entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matched {
            entries.pop(key);
        }
        Ok(matched.len() as u64)
    }

    async fn reconnect(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Glob match supporting `*` only, which is all the invalidation patterns use.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let mut segments = pattern.split('*');
    let head = segments.next().unwrap_or_default();
    let Some(mut rest) = candidate.strip_prefix(head) else {
        return false;
    };

    let tail: Vec<&str> = segments.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(capacity: usize) -> MemoryCacheBackend {
        MemoryCacheBackend::new(NonZeroUsize::new(capacity).expect("non-zero"))
    }

    #[test]
    fn glob_supports_prefix_suffix_and_inner_wildcards() {
        assert!(glob_match("posts:list:*", "posts:list:page:1"));
        assert!(!glob_match("posts:list:*", "posts:search:rust"));
        assert!(glob_match("*:rust", "posts:search:rust"));
        assert!(glob_match("posts:*:page:*", "posts:list:page:2"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let cache = backend(8);
        cache
            .set("k", "v".to_string(), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let cache = backend(2);
        let ttl = Duration::from_secs(60);
        cache.set("a", "1".into(), ttl).await.unwrap();
        cache.set("b", "2".into(), ttl).await.unwrap();
        cache.get("a").await.unwrap();
        cache.set("c", "3".into(), ttl).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(cache.get("b").await.unwrap(), None);
        assert_eq!(cache.get("c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn pattern_delete_leaves_other_keys() {
        let cache = backend(8);
        let ttl = Duration::from_secs(60);
        cache.set("posts:list:page:1", "[]".into(), ttl).await.unwrap();
        cache.set("posts:list:page:2", "[]".into(), ttl).await.unwrap();
        cache.set("post-by-slug:hello", "{}".into(), ttl).await.unwrap();

        let removed = cache.delete_matching("posts:list:*").await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("post-by-slug:hello").await.unwrap().is_some());
    }
}
