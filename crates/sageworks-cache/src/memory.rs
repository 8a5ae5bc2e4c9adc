//! In-process cache store using moka
//!
//! Provides a concurrent key/value cache with:
//! - Bounded capacity (size-based eviction)
//! - A store-wide default time-to-live
//! - Per-entry expiry overriding the default

use crate::store::CacheStore;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache (approximate)
    pub entry_count: u64,
}

/// Stored value together with the expiry it was set with
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    ttl: Option<Duration>,
}

/// Expiry policy reading the TTL off each entry
struct EntryTtl;

impl<K, V> Expiry<K, Entry<V>> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &K,
        entry: &Entry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &K,
        entry: &Entry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // A rewrite restarts the clock
        entry.ttl
    }
}

/// In-memory cache store
///
/// Cloning is cheap and clones share the same underlying storage.
pub struct MemoryCache<K, V> {
    label: &'static str,
    default_ttl: Option<Duration>,
    inner: Cache<K, Entry<V>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create store whose entries never expire unless told to
    #[inline]
    #[must_use]
    pub fn new(label: &'static str, max_capacity: u64) -> Self {
        Self::build(label, max_capacity, None)
    }

    /// Create store whose entries expire after `ttl` by default
    #[inline]
    #[must_use]
    pub fn with_ttl(label: &'static str, max_capacity: u64, ttl: Duration) -> Self {
        Self::build(label, max_capacity, Some(ttl))
    }

    fn build(label: &'static str, max_capacity: u64, default_ttl: Option<Duration>) -> Self {
        Self {
            label,
            default_ttl,
            inner: Cache::builder()
                .name(label)
                .max_capacity(max_capacity)
                .expire_after(EntryTtl)
                .build(),
        }
    }

    /// Store label (used in logs)
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Default time-to-live applied when `set` is given no expiry
    #[inline]
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Flush pending maintenance so counts are exact
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl<K, V> Clone for MemoryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            default_ttl: self.default_ttl,
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> fmt::Debug for MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("label", &self.label)
            .field("default_ttl", &self.default_ttl)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[async_trait]
impl<K, V> CacheStore<K, V> for MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: K, value: V, expire: Option<Duration>) {
        let ttl = expire.or(self.default_ttl);
        tracing::trace!(store = self.label, ?ttl, "cache set");
        self.inner.insert(key, Entry { value, ttl }).await;
    }

    async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }
}
