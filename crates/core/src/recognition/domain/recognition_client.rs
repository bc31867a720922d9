use thiserror::Error;

use crate::recognition::domain::outcome::{EnrollAck, LivenessReport, RecognitionOutcome};
use crate::shared::cancel::{CancelToken, Cancelled};
use crate::shared::payload::Payload;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    /// Network or decode failure; no server verdict is available.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server explicitly refused the request.
    #[error("server rejected request: {0}")]
    Upload(String),
    /// Caught locally before anything was sent.
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl RecognitionError {
    /// Only transport failures may be retried; server verdicts are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, RecognitionError::Transport(_))
    }
}

/// Domain interface to the face-recognition backend.
///
/// Each call makes one logical request; implementations may retry
/// transport failures but never server verdicts.
pub trait RecognitionClient: Send + Sync {
    /// Uploads every payload, in order, as one labeled enrollment batch.
    fn enroll(
        &self,
        label: &str,
        payloads: &[Payload],
        cancel: &CancelToken,
    ) -> Result<EnrollAck, RecognitionError>;

    /// Identifies the person in a single image.
    fn recognize(
        &self,
        payload: &Payload,
        cancel: &CancelToken,
    ) -> Result<RecognitionOutcome, Cancelled>;

    fn test_liveness(
        &self,
        payload: &Payload,
        cancel: &CancelToken,
    ) -> Result<LivenessReport, RecognitionError>;
}
