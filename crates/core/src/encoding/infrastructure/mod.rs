pub mod gallery_loader;
pub mod jpeg_frame_encoder;
