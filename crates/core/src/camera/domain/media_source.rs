use thiserror::Error;

use crate::camera::domain::stream_handle::StreamHandle;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no camera available at '{0}'")]
    NotFound(String),
    #[error("camera access denied for '{0}'")]
    PermissionDenied(String),
    #[error("camera is already streaming to another session")]
    Busy,
    #[error("camera has not been started")]
    NotStarted,
    #[error("camera stream ended")]
    StreamEnded,
    #[error("camera backend error: {0}")]
    Backend(String),
}

/// Receives every frame a live stream produces, e.g. for an on-screen preview.
pub trait FrameSink: Send {
    fn render(&mut self, frame: &Frame);
}

/// A running video stream owned by a [`StreamHandle`].
pub trait VideoStream: Send {
    /// Current video dimensions, or `None` until the first frame arrives.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Returns the most recent frame at call time.
    fn snapshot(&mut self) -> Result<Frame, DeviceError>;

    /// Binds a sink that receives every subsequent frame.
    fn attach(&mut self, sink: Box<dyn FrameSink>);
}

/// Domain interface for camera acquisition.
///
/// Acquisition may block on an operating-system permission prompt. A failed
/// acquisition is reported once; callers retry by calling `acquire` again.
pub trait MediaSource: Send {
    fn acquire(&mut self) -> Result<StreamHandle, DeviceError>;

    /// Human-readable device description for logs.
    fn describe(&self) -> String;
}
