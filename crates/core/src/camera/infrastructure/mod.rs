pub mod ffmpeg_camera_source;
mod frame_relay;
pub mod preview_file_sink;
pub mod still_image_source;
