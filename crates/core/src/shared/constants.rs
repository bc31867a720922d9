pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
pub const SERVER_URL_ENV: &str = "FACECAPTURE_SERVER_URL";

pub const ENROLL_PATH: &str = "/upload-batch";
pub const RECOGNIZE_PATH: &str = "/recognize";
pub const LIVENESS_PATH: &str = "/test-liveness";
pub const REPORT_PATH: &str = "/db-info";
pub const DELETE_USER_PATH: &str = "/delete-user";

pub const DEFAULT_ENROLL_FRAMES: u32 = 20;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// JPEG quality for enrollment bursts.
pub const ENROLL_QUALITY: f32 = 0.8;
/// Liveness cues need more detail than enrollment frames.
pub const RECOGNIZE_QUALITY: f32 = 0.9;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

pub const SNAPSHOT_FILENAME: &str = "snapshot.jpg";
pub const JPEG_MIME: &str = "image/jpeg";
