pub mod media_source;
pub mod stream_handle;
