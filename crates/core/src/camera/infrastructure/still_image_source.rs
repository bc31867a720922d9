use std::path::{Path, PathBuf};

use crate::camera::domain::media_source::{DeviceError, FrameSink, MediaSource, VideoStream};
use crate::camera::domain::stream_handle::{DeviceLock, StreamHandle};
use crate::shared::frame::Frame;

/// Presents a single image file as a live stream.
///
/// Every snapshot returns the same pixels with a fresh sequence number, so
/// the pipeline can run without camera hardware.
pub struct StillImageSource {
    path: PathBuf,
    lock: DeviceLock,
}

impl StillImageSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: DeviceLock::new(),
        }
    }
}

impl MediaSource for StillImageSource {
    fn acquire(&mut self) -> Result<StreamHandle, DeviceError> {
        let lease = self.lock.try_lease()?;
        if !self.path.exists() {
            return Err(DeviceError::NotFound(self.path.display().to_string()));
        }
        let img = image::open(&self.path)
            .map_err(|e| DeviceError::Backend(format!("{}: {e}", self.path.display())))?
            .into_rgb8();
        let (width, height) = img.dimensions();
        log::info!(
            "Streaming still image {} ({width}x{height})",
            self.path.display()
        );
        let stream = StillImageStream {
            pixels: img.into_raw(),
            width,
            height,
            next_sequence: 0,
            sinks: Vec::new(),
        };
        Ok(StreamHandle::new(Box::new(stream), lease))
    }

    fn describe(&self) -> String {
        format!("still image {}", self.path.display())
    }
}

struct StillImageStream {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    next_sequence: u64,
    sinks: Vec<Box<dyn FrameSink>>,
}

impl StillImageStream {
    fn next_frame(&mut self) -> Frame {
        let frame = Frame::new(
            self.pixels.clone(),
            self.width,
            self.height,
            3,
            self.next_sequence,
        );
        self.next_sequence += 1;
        frame
    }
}

impl VideoStream for StillImageStream {
    fn dimensions(&self) -> Option<(u32, u32)> {
        (self.width > 0 && self.height > 0).then_some((self.width, self.height))
    }

    fn snapshot(&mut self) -> Result<Frame, DeviceError> {
        let frame = self.next_frame();
        for sink in self.sinks.iter_mut() {
            sink.render(&frame);
        }
        Ok(frame)
    }

    fn attach(&mut self, mut sink: Box<dyn FrameSink>) {
        let frame = self.next_frame();
        sink.render(&frame);
        self.sinks.push(sink);
    }
}
