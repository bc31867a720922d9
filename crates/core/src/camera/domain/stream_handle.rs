use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::camera::domain::media_source::{DeviceError, FrameSink, VideoStream};
use crate::shared::frame::Frame;

/// Tracks whether a media source currently has an active stream.
#[derive(Clone, Default)]
pub struct DeviceLock {
    active: Arc<AtomicBool>,
}

impl DeviceLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the device, failing with `Busy` if a handle is still alive.
    pub fn try_lease(&self) -> Result<DeviceLease, DeviceError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DeviceError::Busy)?;
        Ok(DeviceLease {
            active: self.active.clone(),
        })
    }

    pub fn is_held(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the device when dropped.
pub struct DeviceLease {
    active: Arc<AtomicBool>,
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Exclusive ownership of one active camera stream.
///
/// Dropping the handle stops the stream first, then frees the device for
/// the next `acquire`.
pub struct StreamHandle {
    stream: Box<dyn VideoStream>,
    _lease: DeviceLease,
}

impl StreamHandle {
    pub fn new(stream: Box<dyn VideoStream>, lease: DeviceLease) -> Self {
        Self {
            stream,
            _lease: lease,
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.stream.dimensions()
    }

    pub fn snapshot(&mut self) -> Result<Frame, DeviceError> {
        self.stream.snapshot()
    }

    pub fn attach(&mut self, sink: Box<dyn FrameSink>) {
        self.stream.attach(sink);
    }
}
