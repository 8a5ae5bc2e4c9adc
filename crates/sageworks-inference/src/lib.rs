//! SageWorks endpoint inference
//!
//! Sends tabular frames to a remote model endpoint:
//! - Frames are split into fixed-size chunks
//! - A chunk rejected for its contents is bisected down to the bad rows
//! - Bad rows come back as placeholder rows instead of failing the call
//!
//! # Example
//!
//! ```rust,ignore
//! use sageworks_inference::{EndpointInference, Frame};
//!
//! # async fn example(predictor: std::sync::Arc<dyn sageworks_inference::Predictor>, frame: Frame) -> sageworks_inference::Result<()> {
//! let endpoint = EndpointInference::new(predictor, vec!["length".into(), "diameter".into()]);
//! let scored = endpoint.predict(&frame).await?;
//! assert_eq!(scored.len(), frame.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bisect;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod predictor;

pub use bisect::BatchSubmitter;
pub use endpoint::{EndpointInference, InferenceConfig};
pub use error::{FrameError, InferenceError, PredictError, Result};
pub use frame::{Frame, Row};
pub use predictor::Predictor;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
