//! Chunked inference against one endpoint

use crate::bisect::BatchSubmitter;
use crate::error::{InferenceError, Result};
use crate::frame::Frame;
use crate::predictor::Predictor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Endpoint inference settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Maximum rows sent per request
    pub chunk_size: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { chunk_size: 500 }
    }
}

impl InferenceConfig {
    /// Builder: set chunk size (zero is treated as one)
    #[must_use]
    pub fn with_chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = rows.max(1);
        self
    }
}

/// Runs frames through a predictor in chunks, isolating bad rows
#[derive(Debug)]
pub struct EndpointInference {
    predictor: Arc<dyn Predictor>,
    features: Vec<String>,
    submitter: BatchSubmitter,
    config: InferenceConfig,
}

impl EndpointInference {
    /// Create inference runner requiring the given feature columns
    #[must_use]
    pub fn new(predictor: Arc<dyn Predictor>, features: Vec<String>) -> Self {
        Self {
            predictor,
            features,
            submitter: BatchSubmitter::new(),
            config: InferenceConfig::default(),
        }
    }

    /// Builder: set config
    #[must_use]
    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder: seed the result columns used for placeholder rows
    #[must_use]
    pub fn with_return_columns(mut self, columns: Vec<String>) -> Self {
        self.submitter = BatchSubmitter::with_return_columns(columns);
        self
    }

    /// Endpoint name
    #[must_use]
    pub fn name(&self) -> &str {
        self.predictor.name()
    }

    /// Required feature columns
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Score every row of `frame`
    ///
    /// Returns one result row per input row, in order.
    ///
    /// # Errors
    /// - `InferenceError::MissingFeatures` if required columns are absent
    /// - Any fatal error from [`BatchSubmitter::submit_batch`]
    pub async fn predict(&self, frame: &Frame) -> Result<Frame> {
        let missing = frame.missing_columns(&self.features);
        if !missing.is_empty() {
            return Err(InferenceError::MissingFeatures(missing));
        }

        let chunks = frame.chunks(self.config.chunk_size);
        tracing::info!(
            endpoint = self.name(),
            rows = frame.len(),
            chunks = chunks.len(),
            "running inference"
        );

        let mut results = Frame::empty(Vec::new());
        for chunk in chunks {
            let scored = self
                .submitter
                .submit_batch(self.predictor.as_ref(), chunk)
                .await?;
            results.append(scored)?;
        }
        Ok(results)
    }
}
