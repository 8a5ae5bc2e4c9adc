//! Error types for batch inference
//!
//! Provides error handling for:
//! - Remote prediction failures (data errors vs fatal service errors)
//! - Frame shape violations
//! - Inference-level checks (missing features, row counts)

/// Errors returned by a predictor for one call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictError {
    /// The service rejected the batch because of its contents
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The service itself failed (model crashed, endpoint misconfigured)
    #[error("service error: {0}")]
    Service(String),

    /// The request never got a proper answer (connection, timeout)
    #[error("transport error: {0}")]
    Transport(String),
}

impl PredictError {
    /// Whether the failure is caused by the rows in the batch
    ///
    /// Only data errors can be narrowed down by splitting the batch.
    #[inline]
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

/// Frame shape violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A row does not have one value per column
    #[error("row {row} has {actual} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Two frames being joined have different columns
    #[error("column mismatch: expected {expected:?}, got {actual:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Main inference error type
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// Unrecoverable prediction failure
    #[error("prediction failed: {0}")]
    Predict(#[from] PredictError),

    /// Frame shape violation
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Predictor answered with the wrong number of rows
    #[error("predictor returned {actual} rows for a batch of {expected}")]
    RowCountMismatch { expected: usize, actual: usize },

    /// Input lacks columns the endpoint needs
    #[error("frame does not contain required features: {0:?}")]
    MissingFeatures(Vec<String>),
}

/// Result alias for inference operations
pub type Result<T, E = InferenceError> = std::result::Result<T, E>;
