//! Broker configuration
//!
//! Loaded from a TOML file. Lookup order:
//! 1. An explicit path
//! 2. The path in `SAGEWORKS_CONFIG_FILE`
//! 3. Built-in defaults
//!
//! ```toml
//! fresh_ttl_ms = 10000
//! max_concurrent_refreshes = 4
//! snapshot_capacity = 64
//! bucket = "sageworks"
//! database_scope = ["sageworks", "sagemaker_featurestore"]
//! ```

use crate::category::Category;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SAGEWORKS_CONFIG_FILE";

/// Broker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// How long a refreshed snapshot counts as fresh, in milliseconds
    pub fresh_ttl_ms: u64,
    /// Maximum background refreshes running at once
    pub max_concurrent_refreshes: usize,
    /// Capacity of the snapshot store
    pub snapshot_capacity: u64,
    /// Bucket holding the object-store categories
    pub bucket: String,
    /// Catalog databases the data catalog connector reads
    pub database_scope: Vec<String>,
}

impl BrokerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With freshness window
    #[inline]
    #[must_use]
    pub fn with_fresh_ttl(mut self, ttl: Duration) -> Self {
        self.fresh_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With background refresh concurrency
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_refreshes(mut self, max: usize) -> Self {
        self.max_concurrent_refreshes = max;
        self
    }

    /// With bucket name
    #[inline]
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// With catalog database scope
    #[inline]
    #[must_use]
    pub fn with_database_scope(mut self, scope: Vec<String>) -> Self {
        self.database_scope = scope;
        self
    }

    /// Freshness window
    #[inline]
    #[must_use]
    pub fn fresh_ttl(&self) -> Duration {
        Duration::from_millis(self.fresh_ttl_ms)
    }

    /// Storage prefix for an object-store category, e.g.
    /// `s3://sageworks/incoming-data/`
    #[must_use]
    pub fn object_store_prefix(&self, category: Category) -> Option<String> {
        category
            .is_object_store()
            .then(|| format!("s3://{}/{}/", self.bucket, category.path_segment()))
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed TOML or unknown keys
    /// - `ConfigError::Invalid` for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - Any error from [`BrokerConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loading broker config");
        Self::from_toml_str(&text)
    }

    /// Load from `path`, else from `SAGEWORKS_CONFIG_FILE`, else defaults
    ///
    /// # Errors
    /// - Any error from [`BrokerConfig::load`]
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(env_path) => {
                tracing::info!("using {} for broker config", CONFIG_ENV_VAR);
                Self::load(env_path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fresh_ttl_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "fresh_ttl_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_concurrent_refreshes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_refreshes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.snapshot_capacity < Category::COUNT as u64 {
            return Err(ConfigError::Invalid {
                field: "snapshot_capacity",
                reason: format!("must hold at least {} snapshots", Category::COUNT),
            });
        }
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "bucket",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            fresh_ttl_ms: 10_000,
            max_concurrent_refreshes: 4,
            snapshot_capacity: 64,
            bucket: "sageworks".to_string(),
            database_scope: vec!["sageworks".to_string(), "sagemaker_featurestore".to_string()],
        }
    }
}
