use std::path::Path;

use crate::encoding::domain::frame_encoder::EncodeError;
use crate::shared::payload::Payload;

/// Loads an image file from disk as a payload, bytes untouched.
///
/// The MIME type comes from the file's magic bytes rather than its
/// extension; files that are not a recognizable image are rejected.
pub fn load_payload(path: &Path) -> Result<Payload, EncodeError> {
    let bytes = std::fs::read(path).map_err(|e| EncodeError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let format = image::guess_format(&bytes)
        .map_err(|_| EncodeError::UnsupportedFormat(path.display().to_string()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(Payload::new(bytes, format.to_mime_type(), filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_png_with_detected_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let payload = load_payload(&path).unwrap();
        assert_eq!(payload.mime_type(), "image/png");
        assert_eq!(payload.filename(), "face.png");
        assert_eq!(payload.bytes(), std::fs::read(&path).unwrap().as_slice());
    }

    #[test]
    fn test_mime_ignores_misleading_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("real.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0]))
            .save(&png)
            .unwrap();
        let renamed = dir.path().join("photo.jpg");
        std::fs::rename(&png, &renamed).unwrap();

        assert_eq!(load_payload(&renamed).unwrap().mime_type(), "image/png");
    }

    #[test]
    fn test_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(matches!(
            load_payload(&path),
            Err(EncodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        assert!(matches!(
            load_payload(Path::new("/nonexistent/face.jpg")),
            Err(EncodeError::Unreadable { .. })
        ));
    }
}
