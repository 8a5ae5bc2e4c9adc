//! SageWorks metadata broker
//!
//! A process-wide cache of metadata snapshots keyed by category:
//! - Blocks on the connector only when nothing is cached (or on demand)
//! - Serves stale snapshots while refreshing them in the background
//! - Bounds background refreshes with a small task pool
//!
//! # Example
//!
//! ```rust,ignore
//! use sageworks_broker::{connectors, BrokerConfig, Category, MetadataBroker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BrokerConfig::resolve(None)?;
//! let broker = MetadataBroker::new(&config, connectors::local_mirror("/data".as_ref(), &config))?;
//!
//! let models = broker.get_metadata(Category::Models, false).await?;
//! println!("{} models", models.len());
//!
//! broker.wait_for_refreshes().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod broker;
pub mod category;
pub mod config;
pub mod connector;
pub mod connectors;
pub mod error;
pub mod refresh_pool;
pub mod snapshot;

// Re-exports for convenience
pub use broker::{AllMetadata, CategoryState, FreshnessStore, MetadataBroker, SnapshotStore};
pub use category::{Category, CategoryMap, UnknownCategory};
pub use config::{BrokerConfig, CONFIG_ENV_VAR};
pub use connector::{Connector, ConnectorTable, ConnectorTableBuilder};
pub use error::{BrokerError, ConfigError, ConnectorError, Result};
pub use refresh_pool::{PoolStats, RefreshOutcome, RefreshPool};
pub use snapshot::{Metadata, Snapshot};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the broker
    pub use crate::{
        BrokerConfig, BrokerError, Category, CategoryState, Connector, ConnectorTable,
        MetadataBroker, Snapshot,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
