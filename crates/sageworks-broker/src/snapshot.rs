//! Metadata snapshots
//!
//! A snapshot is the full metadata payload for one category at a point in
//! time. Snapshots are immutable; a refresh produces a new one.

use crate::category::Category;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata as pulled by a connector: artifact name to attribute object
pub type Metadata = BTreeMap<String, Value>;

/// Full metadata for one category at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    category: Category,
    generation: u64,
    refreshed_at: DateTime<Utc>,
    entries: Metadata,
}

impl Snapshot {
    /// Create snapshot stamped with the current time
    #[must_use]
    pub fn new(category: Category, generation: u64, entries: Metadata) -> Self {
        Self {
            category,
            generation,
            refreshed_at: Utc::now(),
            entries,
        }
    }

    /// Category this snapshot describes
    #[inline]
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Broker-wide refresh sequence number; later refreshes have larger values
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the connector produced this snapshot
    #[inline]
    #[must_use]
    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// All entries
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &Metadata {
        &self.entries
    }

    /// Attributes of one artifact
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Artifact names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of artifacts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot lists no artifacts
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
