use std::time::Duration;

use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_ENROLL_FRAMES, DEFAULT_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_BACKOFF_MS, DEFAULT_SERVER_URL, DELETE_USER_PATH, ENROLL_PATH, ENROLL_QUALITY,
    LIVENESS_PATH, RECOGNIZE_PATH, RECOGNIZE_QUALITY, REPORT_PATH, SERVER_URL_ENV,
};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("server URL must start with http:// or https://, got '{0}'")]
    InvalidServerUrl(String),
    #[error("request timeout must be positive")]
    ZeroTimeout,
    #[error("{name} must be in (0, 1], got {value}")]
    InvalidQuality { name: &'static str, value: f32 },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

/// Backend paths, relative to the server URL.
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoints {
    pub enroll: String,
    pub recognize: String,
    pub liveness: String,
    pub report: String,
    pub delete_user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            enroll: ENROLL_PATH.to_string(),
            recognize: RECOGNIZE_PATH.to_string(),
            liveness: LIVENESS_PATH.to_string(),
            report: REPORT_PATH.to_string(),
            delete_user: DELETE_USER_PATH.to_string(),
        }
    }
}

/// Connection settings for the recognition backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub server_url: String,
    pub endpoints: Endpoints,
    pub timeout: Duration,
    /// Extra attempts after a transport failure. Zero means one attempt per action.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            endpoints: Endpoints::default(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: 0,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl ClientConfig {
    /// Defaults, with the server URL taken from `FACECAPTURE_SERVER_URL` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(SERVER_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.server_url = url.trim().to_string();
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidServerUrl(self.server_url.clone()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Joins the server URL and a path without doubling the slash.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Capture timing and encoding settings for one capture session.
#[derive(Clone, Debug, PartialEq)]
pub struct SequencerConfig {
    pub enroll_frames: u32,
    pub interval: Duration,
    pub enroll_quality: f32,
    pub recognize_quality: f32,
    /// Smallest interrupted burst that is still uploaded.
    pub min_partial_frames: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            enroll_frames: DEFAULT_ENROLL_FRAMES,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            enroll_quality: ENROLL_QUALITY,
            recognize_quality: RECOGNIZE_QUALITY,
            min_partial_frames: 1,
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enroll_frames == 0 {
            return Err(ConfigError::NotPositive("enroll frame count"));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::NotPositive("capture interval"));
        }
        if self.min_partial_frames == 0 {
            return Err(ConfigError::NotPositive("minimum partial frame count"));
        }
        for (name, value) in [
            ("enroll quality", self.enroll_quality),
            ("recognize quality", self.recognize_quality),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidQuality { name, value });
            }
        }
        Ok(())
    }
}
