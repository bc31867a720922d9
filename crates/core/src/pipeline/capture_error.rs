use thiserror::Error;

use crate::camera::domain::media_source::DeviceError;
use crate::encoding::domain::frame_encoder::EncodeError;
use crate::pipeline::capture_request::ValidationError;
use crate::recognition::domain::recognition_client::RecognitionError;
use crate::shared::cancel::Cancelled;

/// Every way a capture action can end without a backend verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("captured {captured} of {requested} frames, below the minimum of {minimum} ({reason})")]
    Incomplete {
        captured: usize,
        requested: u32,
        minimum: u32,
        reason: String,
    },
    #[error("capture cancelled")]
    Cancelled,
}

impl From<Cancelled> for CaptureError {
    fn from(_: Cancelled) -> Self {
        CaptureError::Cancelled
    }
}

impl CaptureError {
    /// Normalizes a cancellation reported by the client layer.
    pub fn flatten(self) -> Self {
        match self {
            CaptureError::Recognition(RecognitionError::Cancelled(_)) => CaptureError::Cancelled,
            other => other,
        }
    }
}
