use thiserror::Error;

use crate::camera::domain::media_source::DeviceError;
use crate::camera::domain::stream_handle::StreamHandle;
use crate::shared::frame::Frame;
use crate::shared::payload::Payload;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("video stream has no frame dimensions yet")]
    NotReady,
    #[error("camera failed during capture: {0}")]
    Device(#[from] DeviceError),
    #[error("quality must be in (0, 1], got {0}")]
    InvalidQuality(f32),
    #[error("frame data does not match {width}x{height}x{channels}")]
    MalformedFrame { width: u32, height: u32, channels: u8 },
    #[error("image encoding failed: {0}")]
    Codec(String),
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("{0} is not a supported image")]
    UnsupportedFormat(String),
}

/// Serializes frames into transferable image payloads.
///
/// Implementations must be deterministic: identical frame bytes and
/// quality yield identical payload bytes.
pub trait FrameEncoder: Send + Sync {
    /// `quality` in (0, 1] controls lossy compression.
    fn serialize(&self, frame: &Frame, quality: f32) -> Result<Payload, EncodeError>;
}

/// Snapshots the stream's current picture.
///
/// Fails with `NotReady` while the stream has not produced dimensions yet.
pub fn capture(handle: &mut StreamHandle) -> Result<Frame, EncodeError> {
    match handle.dimensions() {
        Some((w, h)) if w > 0 && h > 0 => handle.snapshot().map_err(EncodeError::from),
        _ => Err(EncodeError::NotReady),
    }
}
