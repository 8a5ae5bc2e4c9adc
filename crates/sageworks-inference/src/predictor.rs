//! Remote prediction seam

use crate::error::PredictError;
use crate::frame::Frame;
use async_trait::async_trait;
use std::fmt::Debug;

/// A remote model endpoint scoring batches of rows
///
/// Implementations return one result row per input row, in input order.
/// Failures must say whether the batch contents were at fault
/// ([`PredictError::InvalidInput`]) or the service was.
#[async_trait]
pub trait Predictor: Send + Sync + Debug {
    /// Endpoint name, used in logs and metrics
    fn name(&self) -> &str;

    /// Score one batch
    async fn predict(&self, batch: &Frame) -> Result<Frame, PredictError>;
}
