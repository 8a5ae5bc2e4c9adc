//! Bisecting batch submission
//!
//! A batch rejected because of its contents is split in half and each half
//! resubmitted, down to single rows. A single row that still fails is
//! replaced by a placeholder row shaped like the last successful result, so
//! the caller always gets one result row per input row.

use crate::error::{InferenceError, Result};
use crate::frame::Frame;
use crate::predictor::Predictor;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;

/// Submits batches to a predictor, isolating bad rows by bisection
#[derive(Debug, Default)]
pub struct BatchSubmitter {
    /// Columns of the last successful result
    known_columns: Mutex<Option<Vec<String>>>,
}

impl BatchSubmitter {
    /// Create submitter with no known result shape
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create submitter that already knows the endpoint's result columns
    #[must_use]
    pub fn with_return_columns(columns: Vec<String>) -> Self {
        Self {
            known_columns: Mutex::new(Some(columns)),
        }
    }

    /// Columns of the last successful result, if any
    #[must_use]
    pub fn known_columns(&self) -> Option<Vec<String>> {
        self.known_columns.lock().clone()
    }

    /// Submit a batch, returning exactly one result row per input row
    ///
    /// # Errors
    /// - `InferenceError::Predict` for service or transport failures, or a
    ///   bad single row when no result shape is known yet
    /// - `InferenceError::RowCountMismatch` if the predictor drops or adds rows
    pub async fn submit_batch(&self, predictor: &dyn Predictor, batch: Frame) -> Result<Frame> {
        self.submit(predictor, batch).await
    }

    fn submit<'a>(&'a self, predictor: &'a dyn Predictor, batch: Frame) -> BoxFuture<'a, Result<Frame>> {
        async move {
            if batch.is_empty() {
                let columns = self
                    .known_columns()
                    .unwrap_or_else(|| batch.columns().to_vec());
                return Ok(Frame::empty(columns));
            }

            let err = match predictor.predict(&batch).await {
                Ok(result) => return self.accept(&batch, result),
                Err(err) => err,
            };

            if !err.is_data_error() {
                tracing::error!(
                    endpoint = predictor.name(),
                    rows = batch.len(),
                    error = %err,
                    "fatal prediction error"
                );
                return Err(err.into());
            }

            if batch.len() == 1 {
                let Some(columns) = self.known_columns() else {
                    tracing::error!(
                        endpoint = predictor.name(),
                        error = %err,
                        "bad row and no known result shape to pad with"
                    );
                    return Err(err.into());
                };
                tracing::warn!(
                    endpoint = predictor.name(),
                    error = %err,
                    "substituting placeholder for unscorable row"
                );
                metrics::counter!(
                    "sageworks_inference_placeholder_rows_total",
                    "endpoint" => predictor.name().to_string()
                )
                .increment(1);
                let row = batch.placeholder_row(0, &columns);
                return Ok(Frame::new(columns, vec![row])?);
            }

            let mid = batch.len() / 2;
            tracing::debug!(
                endpoint = predictor.name(),
                rows = batch.len(),
                mid,
                error = %err,
                "splitting rejected batch"
            );
            let (head, tail) = batch.split_at(mid);
            let mut results = self.submit(predictor, head).await?;
            results.append(self.submit(predictor, tail).await?)?;
            Ok(results)
        }
        .boxed()
    }

    fn accept(&self, batch: &Frame, result: Frame) -> Result<Frame> {
        if result.len() != batch.len() {
            return Err(InferenceError::RowCountMismatch {
                expected: batch.len(),
                actual: result.len(),
            });
        }
        *self.known_columns.lock() = Some(result.columns().to_vec());
        Ok(result)
    }
}
