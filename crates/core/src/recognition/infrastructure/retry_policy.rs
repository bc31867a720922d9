use std::time::Duration;

use crate::recognition::domain::recognition_client::RecognitionError;
use crate::shared::cancel::CancelToken;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded exponential backoff for transport failures.
///
/// Server verdicts (upload rejections, liveness failures) and local errors
/// are returned on the first attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// One attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    pub fn should_retry(&self, retries_done: u32, error: &RecognitionError) -> bool {
        retries_done < self.max_retries && error.is_transient()
    }

    /// Runs `attempt` until it succeeds, fails permanently, exhausts the
    /// retry budget, or `cancel` fires during a backoff wait.
    pub fn run<T>(
        &self,
        cancel: &CancelToken,
        mut attempt: impl FnMut() -> Result<T, RecognitionError>,
    ) -> Result<T, RecognitionError> {
        let mut retries_done = 0;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(retries_done, &e) => {
                    let delay = self.delay(retries_done);
                    log::warn!(
                        "Request failed ({e}); retry {} of {} in {}ms",
                        retries_done + 1,
                        self.max_retries,
                        delay.as_millis()
                    );
                    cancel.wait(delay)?;
                    retries_done += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
