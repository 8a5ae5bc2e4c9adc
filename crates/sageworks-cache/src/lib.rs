//! SageWorks cache stores
//!
//! The key/value stores the metadata broker keeps its state in.
//!
//! # Stores
//!
//! - [`CacheStore`]: the capability the broker consumes (`get`, `set` with an
//!   optional expiry, `invalidate`)
//! - [`MemoryCache`]: concurrent in-process implementation backed by moka,
//!   with a store-wide default TTL and per-entry overrides
//!
//! The broker uses two instances: one without expiry for metadata snapshots,
//! and one with a short TTL whose entries act as freshness flags.
//!
//! # Example
//!
//! ```rust,ignore
//! use sageworks_cache::{CacheStore, MemoryCache};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let fresh = MemoryCache::<&'static str, bool>::with_ttl("fresh", 16, Duration::from_secs(10));
//! fresh.set("models", true, None).await;
//! assert_eq!(fresh.get(&"models").await, Some(true));
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod memory;
pub mod store;

pub use memory::{CacheStats, MemoryCache};
pub use store::CacheStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
