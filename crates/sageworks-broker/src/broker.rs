//! Metadata broker
//!
//! Serves the latest snapshot for each category:
//! - No snapshot yet, or a forced refresh: block on the connector
//! - Snapshot present but stale: return it and refresh in the background
//! - Snapshot present and fresh: return it without any I/O
//!
//! Refreshes of one category are serialized by a per-category lock. A forced
//! refresh arriving while a background refresh is in flight waits for it and
//! then performs its own connector call. Cold-start callers racing on an
//! empty category share a single connector call.

use crate::category::{Category, CategoryMap};
use crate::config::BrokerConfig;
use crate::connector::ConnectorTable;
use crate::error::{BrokerError, Result};
use crate::refresh_pool::{PoolStats, RefreshOutcome, RefreshPool};
use crate::snapshot::Snapshot;
use futures::future::join_all;
use sageworks_cache::{CacheStore, MemoryCache};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Snapshot store used by the broker
pub type SnapshotStore = Arc<dyn CacheStore<Category, Arc<Snapshot>>>;

/// Freshness-flag store used by the broker
pub type FreshnessStore = Arc<dyn CacheStore<Category, bool>>;

/// Where a category is in its refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryState {
    /// No snapshot has ever been stored
    Empty,
    /// Snapshot stored and refreshed within the freshness window
    Fresh,
    /// Snapshot stored but the freshness window has passed
    Stale,
}

/// Result of fetching every category
///
/// Categories fail independently; a failing connector leaves the others'
/// snapshots in `snapshots`.
#[derive(Debug, Default)]
pub struct AllMetadata {
    /// Snapshots obtained, by category
    pub snapshots: BTreeMap<Category, Arc<Snapshot>>,
    /// Categories whose fetch failed
    pub errors: BTreeMap<Category, BrokerError>,
}

impl AllMetadata {
    /// Snapshot for a category, if it was obtained
    #[inline]
    #[must_use]
    pub fn get(&self, category: Category) -> Option<&Arc<Snapshot>> {
        self.snapshots.get(&category)
    }

    /// Whether every category produced a snapshot
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshMode {
    /// Always call the connector
    Always,
    /// Skip if another caller stored a snapshot while we waited
    IfEmpty,
    /// Skip if another refresh made the category fresh while we waited
    IfStale,
}

struct Inner {
    connectors: ConnectorTable,
    meta_cache: SnapshotStore,
    fresh_cache: FreshnessStore,
    fresh_ttl: Duration,
    refresh_locks: CategoryMap<Mutex<()>>,
    generation: AtomicU64,
    pool: RefreshPool,
}

/// Process-wide metadata cache with background refresh
///
/// Construct once and share the handle; clones refer to the same broker.
#[derive(Clone)]
pub struct MetadataBroker {
    inner: Arc<Inner>,
}

impl MetadataBroker {
    /// Create broker with in-memory stores
    ///
    /// # Errors
    /// - `BrokerError::Config` if `config` fails validation
    pub fn new(config: &BrokerConfig, connectors: ConnectorTable) -> Result<Self> {
        let meta_cache: SnapshotStore = Arc::new(MemoryCache::new("meta", config.snapshot_capacity));
        let fresh_cache: FreshnessStore = Arc::new(MemoryCache::with_ttl(
            "fresh",
            config.snapshot_capacity,
            config.fresh_ttl(),
        ));
        Self::with_stores(config, connectors, meta_cache, fresh_cache)
    }

    /// Create broker over caller-supplied stores
    ///
    /// # Errors
    /// - `BrokerError::Config` if `config` fails validation
    pub fn with_stores(
        config: &BrokerConfig,
        connectors: ConnectorTable,
        meta_cache: SnapshotStore,
        fresh_cache: FreshnessStore,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            fresh_ttl_ms = config.fresh_ttl_ms,
            max_concurrent_refreshes = config.max_concurrent_refreshes,
            "creating metadata broker"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                connectors,
                meta_cache,
                fresh_cache,
                fresh_ttl: config.fresh_ttl(),
                refresh_locks: CategoryMap::default(),
                generation: AtomicU64::new(0),
                pool: RefreshPool::new(config.max_concurrent_refreshes),
            }),
        })
    }

    /// Get the metadata for one category
    ///
    /// # Workflow
    /// 1. Nothing cached, or `force_fresh`: refresh synchronously
    /// 2. Cached but stale: schedule a background refresh, return cached
    /// 3. Cached and fresh: return cached
    ///
    /// # Errors
    /// - `BrokerError::RefreshFailed` when a synchronous refresh fails
    pub async fn get_metadata(&self, category: Category, force_fresh: bool) -> Result<Arc<Snapshot>> {
        if force_fresh {
            tracing::info!(%category, "blocking: forced metadata refresh");
            return self
                .inner
                .refresh(category, RefreshMode::Always)
                .await
                .map(|(snapshot, _)| snapshot);
        }

        let Some(snapshot) = self.inner.meta_cache.get(&category).await else {
            tracing::info!(%category, "blocking: no cached metadata");
            return self
                .inner
                .refresh(category, RefreshMode::IfEmpty)
                .await
                .map(|(snapshot, _)| snapshot);
        };

        if self.inner.fresh_cache.contains(&category).await {
            tracing::debug!(%category, generation = snapshot.generation(), "metadata is fresh");
            return Ok(snapshot);
        }

        tracing::info!(%category, "metadata is stale, scheduling background refresh");
        let inner = Arc::clone(&self.inner);
        self.inner.pool.try_schedule(category, async move {
            inner
                .refresh(category, RefreshMode::IfStale)
                .await
                .map(|(_, outcome)| outcome)
        });
        Ok(snapshot)
    }

    /// Get the metadata for every category
    ///
    /// Each category follows [`MetadataBroker::get_metadata`] independently;
    /// there is no cross-category consistency.
    pub async fn get_all_metadata(&self, force_fresh: bool) -> AllMetadata {
        tracing::warn!("getting metadata for every category; prefer get_metadata() per category");

        let fetches = Category::ALL.into_iter().map(|category| async move {
            (category, self.get_metadata(category, force_fresh).await)
        });

        let mut all = AllMetadata::default();
        for (category, result) in join_all(fetches).await {
            match result {
                Ok(snapshot) => {
                    all.snapshots.insert(category, snapshot);
                }
                Err(e) => {
                    all.errors.insert(category, e);
                }
            }
        }
        all
    }

    /// Refresh one category now, regardless of freshness
    ///
    /// # Errors
    /// - `BrokerError::RefreshFailed` if the connector fails; the stored
    ///   snapshot and freshness are left untouched
    pub async fn refresh(&self, category: Category) -> Result<()> {
        self.inner
            .refresh(category, RefreshMode::Always)
            .await
            .map(|_| ())
    }

    /// Wait for every background refresh launched so far
    pub async fn wait_for_refreshes(&self) {
        self.inner.pool.drain().await;
    }

    /// Current state of a category's refresh cycle
    pub async fn category_state(&self, category: Category) -> CategoryState {
        if !self.inner.meta_cache.contains(&category).await {
            CategoryState::Empty
        } else if self.inner.fresh_cache.contains(&category).await {
            CategoryState::Fresh
        } else {
            CategoryState::Stale
        }
    }

    /// Total `ContentLength` of objects whose key contains `prefix`
    ///
    /// The prefix is matched as a directory: trailing slashes are trimmed
    /// and exactly one is appended. An empty prefix matches every object.
    ///
    /// # Errors
    /// - `BrokerError::NotObjectStore` for non-listing categories
    /// - Any error from [`MetadataBroker::get_metadata`]
    pub async fn object_sizes(&self, category: Category, prefix: &str) -> Result<u64> {
        if !category.is_object_store() {
            return Err(BrokerError::NotObjectStore(category));
        }
        let snapshot = self.get_metadata(category, false).await?;

        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix.trim_end_matches('/'))
        };
        Ok(snapshot
            .entries()
            .iter()
            .filter(|(key, _)| key.contains(&prefix))
            .filter_map(|(_, info)| info.get("ContentLength").and_then(Value::as_u64))
            .sum())
    }

    /// Run every connector's connectivity probe
    pub async fn check_connectors(&self) -> BTreeMap<Category, bool> {
        let probes = self
            .inner
            .connectors
            .iter()
            .map(|(category, connector)| async move { (category, connector.check().await) });
        join_all(probes).await.into_iter().collect()
    }

    /// Background refresh pool statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.pool.stats()
    }

    /// Connectors this broker was built with
    #[inline]
    #[must_use]
    pub fn connectors(&self) -> &ConnectorTable {
        &self.inner.connectors
    }
}

impl std::fmt::Debug for MetadataBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataBroker")
            .field("connectors", &self.inner.connectors)
            .field("fresh_ttl", &self.inner.fresh_ttl)
            .field("pool", &self.inner.pool.stats())
            .finish_non_exhaustive()
    }
}

impl Inner {
    async fn refresh(
        &self,
        category: Category,
        mode: RefreshMode,
    ) -> Result<(Arc<Snapshot>, RefreshOutcome)> {
        let _guard = self.refresh_locks[category].lock().await;

        match mode {
            RefreshMode::Always => {}
            RefreshMode::IfEmpty => {
                if let Some(snapshot) = self.meta_cache.get(&category).await {
                    tracing::debug!(%category, "joined concurrent cold-start refresh");
                    return Ok((snapshot, RefreshOutcome::AlreadyFresh));
                }
            }
            RefreshMode::IfStale => {
                if self.fresh_cache.contains(&category).await {
                    if let Some(snapshot) = self.meta_cache.get(&category).await {
                        tracing::debug!(%category, "already refreshed, skipping");
                        return Ok((snapshot, RefreshOutcome::AlreadyFresh));
                    }
                }
            }
        }

        let connector = self.connectors.get(category);
        let started = Instant::now();
        let entries = match connector.refresh().await {
            Ok(entries) => entries,
            Err(source) => {
                metrics::counter!(
                    "sageworks_broker_refresh_total",
                    "category" => category.as_str(),
                    "outcome" => "failed"
                )
                .increment(1);
                tracing::warn!(
                    %category,
                    connector = connector.name(),
                    error = %source,
                    "metadata refresh failed, keeping previous snapshot"
                );
                return Err(BrokerError::RefreshFailed { category, source });
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(Snapshot::new(category, generation, entries));
        self.meta_cache
            .set(category, Arc::clone(&snapshot), None)
            .await;
        self.fresh_cache
            .set(category, true, Some(self.fresh_ttl))
            .await;

        let elapsed = started.elapsed();
        metrics::counter!(
            "sageworks_broker_refresh_total",
            "category" => category.as_str(),
            "outcome" => "ok"
        )
        .increment(1);
        metrics::histogram!("sageworks_broker_refresh_seconds", "category" => category.as_str())
            .record(elapsed.as_secs_f64());
        tracing::info!(
            %category,
            generation,
            entries = snapshot.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "metadata refreshed"
        );
        Ok((snapshot, RefreshOutcome::Refreshed))
    }
}
