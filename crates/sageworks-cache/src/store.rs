//! Cache store capability
//!
//! Anything that behaves like a dictionary with optional expiry can back the
//! broker: the in-memory [`MemoryCache`](crate::MemoryCache), or an adapter
//! over an external key/value service.

use async_trait::async_trait;
use std::time::Duration;

/// Key/value store with optional expiry
///
/// # Contract
/// - `set` replaces the whole value; there is no partial mutation
/// - `get` never returns an entry whose expiry has passed
/// - `expire = None` means the store's own default applies (which may be
///   "never")
#[async_trait]
pub trait CacheStore<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Get the value stored under `key`, if present and not expired
    async fn get(&self, key: &K) -> Option<V>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: K, value: V, expire: Option<Duration>);

    /// Remove `key` from the store
    async fn invalidate(&self, key: &K);

    /// Whether `key` is present and not expired
    async fn contains(&self, key: &K) -> bool {
        self.get(key).await.is_some()
    }
}
