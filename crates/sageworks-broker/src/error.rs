//! Error types for the metadata broker
//!
//! Provides error handling for:
//! - Connector refresh failures
//! - Broker construction (missing connectors)
//! - Category misuse
//! - Configuration loading

use crate::category::{Category, UnknownCategory};
use std::path::PathBuf;

/// Result alias for broker operations
pub type Result<T, E = BrokerError> = std::result::Result<T, E>;

/// Main broker error type
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Connector failed while refreshing a category
    #[error("refresh of {category} failed: {source}")]
    RefreshFailed {
        /// Category being refreshed
        category: Category,
        /// Underlying connector failure
        #[source]
        source: ConnectorError,
    },

    /// No connector registered for a category
    #[error("no connector registered for {0}")]
    MissingConnector(Category),

    /// Operation only valid for object-store categories
    #[error("{0} is not an object-store category")]
    NotObjectStore(Category),

    /// Unrecognized category name
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BrokerError {
    /// Check if a later call may succeed where this one failed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. })
    }

    /// Category the error concerns, if any
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::RefreshFailed { category, .. } => Some(*category),
            Self::MissingConnector(category) | Self::NotObjectStore(category) => Some(*category),
            Self::UnknownCategory(_) | Self::Config(_) => None,
        }
    }
}

/// Errors raised by connectors while pulling metadata
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Remote service could not be reached
    #[error("{service} unreachable: {message}")]
    Unreachable { service: String, message: String },

    /// Remote service rejected or failed the request
    #[error("{service} request failed: {message}")]
    RequestFailed { service: String, message: String },

    /// Response could not be turned into metadata
    #[error("malformed metadata: {0}")]
    Malformed(String),

    /// Local IO failure
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConnectorError {
    /// Create request failure for service
    pub fn request_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create unreachable error for service
    pub fn unreachable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected shape
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
