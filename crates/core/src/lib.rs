pub mod camera;
pub mod encoding;
pub mod pipeline;
pub mod recognition;
pub mod shared;
