use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::shared::config::SequencerConfig;
use crate::shared::payload::Payload;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    Enroll,
    Recognize,
    LivenessTest,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Enroll => write!(f, "enroll"),
            CaptureMode::Recognize => write!(f, "recognize"),
            CaptureMode::LivenessTest => write!(f, "liveness test"),
        }
    }
}

/// Rejections raised before any frame is captured or sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a name is required to enroll")]
    MissingLabel,
    #[error("only enrollment captures carry a name")]
    UnexpectedLabel,
    #[error("frame count must be positive")]
    ZeroFrames,
    #[error("{0} captures exactly one frame")]
    SingleFrameOnly(CaptureMode),
    #[error("capture interval must be positive")]
    ZeroInterval,
    #[error("expected an enrollment request, got {0}")]
    NotEnrollment(CaptureMode),
}

/// What one user action asks the sequencer to capture.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureRequest {
    mode: CaptureMode,
    label: Option<String>,
    frame_count: u32,
    interval: Duration,
}

impl CaptureRequest {
    pub fn new(
        mode: CaptureMode,
        label: Option<String>,
        frame_count: u32,
        interval: Duration,
    ) -> Self {
        Self {
            mode,
            label,
            frame_count,
            interval,
        }
    }

    pub fn enroll(label: impl Into<String>, frame_count: u32, interval: Duration) -> Self {
        Self::new(CaptureMode::Enroll, Some(label.into()), frame_count, interval)
    }

    /// Enrollment burst using the configured frame count and interval.
    pub fn enroll_with(label: impl Into<String>, config: &SequencerConfig) -> Self {
        Self::enroll(label, config.enroll_frames, config.interval)
    }

    pub fn recognize() -> Self {
        Self::new(CaptureMode::Recognize, None, 1, Duration::ZERO)
    }

    pub fn liveness_test() -> Self {
        Self::new(CaptureMode::LivenessTest, None, 1, Duration::ZERO)
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// The trimmed label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref().map(str::trim)
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.mode {
            CaptureMode::Enroll => {
                if self.label().map_or(true, str::is_empty) {
                    return Err(ValidationError::MissingLabel);
                }
                if self.frame_count == 0 {
                    return Err(ValidationError::ZeroFrames);
                }
                if self.interval.is_zero() {
                    return Err(ValidationError::ZeroInterval);
                }
            }
            mode => {
                if self.label.is_some() {
                    return Err(ValidationError::UnexpectedLabel);
                }
                if self.frame_count != 1 {
                    return Err(ValidationError::SingleFrameOnly(mode));
                }
            }
        }
        Ok(())
    }
}

/// Payloads in capture order.
///
/// Shorter than requested only when the capture loop was interrupted;
/// `interruption` then says why.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureResult {
    pub payloads: Vec<Payload>,
    pub requested: u32,
    pub interruption: Option<String>,
}

impl CaptureResult {
    pub fn is_partial(&self) -> bool {
        (self.payloads.len() as u64) < self.requested as u64
    }
}
