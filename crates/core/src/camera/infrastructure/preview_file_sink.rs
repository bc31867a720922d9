use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::camera::domain::media_source::FrameSink;
use crate::shared::frame::Frame;

const DEFAULT_REFRESH: Duration = Duration::from_millis(500);

/// Live preview that rewrites an image file with the latest frame.
///
/// Writes go to a sibling `.part` file first and are renamed into place, so
/// an image viewer watching the path never sees a half-written file.
/// Frames arriving faster than `refresh` are skipped.
pub struct PreviewFileSink {
    path: PathBuf,
    refresh: Duration,
    max_width: Option<u32>,
    last_write: Option<Instant>,
}

impl PreviewFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            refresh: DEFAULT_REFRESH,
            max_width: None,
            last_write: None,
        }
    }

    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    /// Downscales previews wider than `max_width`, keeping the aspect ratio.
    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width.max(1));
        self
    }

    fn due(&self) -> bool {
        self.last_write
            .map(|at| at.elapsed() >= self.refresh)
            .unwrap_or(true)
    }

    fn write(&self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;

        let img = match self.max_width {
            Some(max_w) if img.width() > max_w => {
                let h = (img.height() as u64 * max_w as u64 / img.width() as u64).max(1) as u32;
                image::imageops::resize(&img, max_w, h, image::imageops::FilterType::Triangle)
            }
            _ => img,
        };

        let format = image::ImageFormat::from_path(&self.path).unwrap_or(image::ImageFormat::Jpeg);
        let temp_path = self.path.with_extension("part");
        img.save_with_format(&temp_path, format)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl FrameSink for PreviewFileSink {
    fn render(&mut self, frame: &Frame) {
        if !self.due() {
            return;
        }
        match self.write(frame) {
            Ok(()) => self.last_write = Some(Instant::now()),
            Err(e) => log::warn!("Preview write to {} failed: {e}", self.path.display()),
        }
    }
}
