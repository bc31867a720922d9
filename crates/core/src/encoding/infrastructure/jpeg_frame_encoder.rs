use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::encoding::domain::frame_encoder::{EncodeError, FrameEncoder};
use crate::shared::constants::JPEG_MIME;
use crate::shared::frame::Frame;
use crate::shared::payload::Payload;

const DEFAULT_FILENAME: &str = "frame.jpg";

/// Encodes frames as baseline JPEG using the `image` crate.
pub struct JpegFrameEncoder;

impl JpegFrameEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps (0, 1] onto the encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> Result<u8, EncodeError> {
    if !(quality > 0.0 && quality <= 1.0) {
        return Err(EncodeError::InvalidQuality(quality));
    }
    Ok((quality * 100.0).round().clamp(1.0, 100.0) as u8)
}

impl FrameEncoder for JpegFrameEncoder {
    fn serialize(&self, frame: &Frame, quality: f32) -> Result<Payload, EncodeError> {
        let quality = jpeg_quality(quality)?;
        let expected = frame.width() as usize * frame.height() as usize * frame.channels() as usize;
        if frame.data().len() != expected || frame.width() == 0 || frame.height() == 0 {
            return Err(EncodeError::MalformedFrame {
                width: frame.width(),
                height: frame.height(),
                channels: frame.channels(),
            });
        }

        let stripped;
        let (pixels, color) = match frame.channels() {
            1 => (frame.data(), ExtendedColorType::L8),
            3 => (frame.data(), ExtendedColorType::Rgb8),
            // JPEG has no alpha channel.
            4 => {
                stripped = frame
                    .data()
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect::<Vec<u8>>();
                (stripped.as_slice(), ExtendedColorType::Rgb8)
            }
            channels => {
                return Err(EncodeError::MalformedFrame {
                    width: frame.width(),
                    height: frame.height(),
                    channels,
                })
            }
        };

        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode(pixels, frame.width(), frame.height(), color)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;

        Ok(Payload::new(bytes, JPEG_MIME, DEFAULT_FILENAME))
    }
}
