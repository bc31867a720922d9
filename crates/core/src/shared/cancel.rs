use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cooperative cancellation shared between a capture action and whoever
/// may abort it.
///
/// Cancelling drops the only sender, so every clone blocked in [`wait`] or
/// selecting on [`signal`] wakes immediately.
///
/// [`wait`]: CancelToken::wait
/// [`signal`]: CancelToken::signal
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Ok(mut trigger) = self.trigger.lock() {
            trigger.take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Disconnects when the token is cancelled; never yields a value.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Sleeps for `duration`, returning early with `Cancelled` if the
    /// token fires first.
    pub fn wait(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        crossbeam_channel::select! {
            recv(self.signal) -> _ => Err(Cancelled),
            default(duration) => Ok(()),
        }
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
