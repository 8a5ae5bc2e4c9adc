//! Connector capability
//!
//! A connector knows how to pull the full metadata for one category from a
//! remote system. The broker holds exactly one connector per category in a
//! [`ConnectorTable`] resolved at construction time.

use crate::category::{Category, CategoryMap};
use crate::error::{BrokerError, ConnectorError};
use crate::snapshot::Metadata;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Pulls metadata for one category
///
/// # Contract
/// - `refresh` performs a synchronous full pull; it never returns partial
///   data on success
/// - Implementations hold no state between refreshes other than their
///   connection handle
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Human-readable connector name
    fn name(&self) -> &str;

    /// Connectivity probe
    async fn check(&self) -> bool;

    /// Pull the full metadata for this connector's category
    async fn refresh(&self) -> Result<Metadata, ConnectorError>;
}

/// One connector per category
#[derive(Clone)]
pub struct ConnectorTable {
    slots: CategoryMap<Arc<dyn Connector>>,
}

impl ConnectorTable {
    /// Start building a table
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectorTableBuilder {
        ConnectorTableBuilder::default()
    }

    /// Build table by creating each category's connector
    pub fn from_fn(f: impl FnMut(Category) -> Arc<dyn Connector>) -> Self {
        Self {
            slots: CategoryMap::from_fn(f),
        }
    }

    /// Connector for a category
    #[inline]
    #[must_use]
    pub fn get(&self, category: Category) -> &Arc<dyn Connector> {
        &self.slots[category]
    }

    /// Iterate `(category, connector)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Category, &Arc<dyn Connector>)> {
        self.slots.iter()
    }
}

impl fmt::Debug for ConnectorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(c, conn)| (c, conn.name())))
            .finish()
    }
}

/// Builder requiring every category to be covered
#[derive(Default)]
pub struct ConnectorTableBuilder {
    slots: CategoryMap<Option<Arc<dyn Connector>>>,
}

impl ConnectorTableBuilder {
    /// Register the connector for a category (replaces any earlier one)
    #[must_use]
    pub fn with(mut self, category: Category, connector: Arc<dyn Connector>) -> Self {
        self.slots[category] = Some(connector);
        self
    }

    /// Finish the table
    ///
    /// # Errors
    /// - `BrokerError::MissingConnector` for the first uncovered category
    pub fn build(self) -> Result<ConnectorTable, BrokerError> {
        let mut connectors = Vec::with_capacity(Category::COUNT);
        for (category, slot) in self.slots.iter() {
            connectors.push(slot.clone().ok_or(BrokerError::MissingConnector(category))?);
        }
        Ok(ConnectorTable {
            slots: CategoryMap::from_fn(|c| Arc::clone(&connectors[c.index()])),
        })
    }
}
