use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::camera::domain::media_source::FrameSink;
use crate::shared::frame::Frame;

/// Hand-off point between a producing capture thread and the stream handle.
///
/// Holds the latest frame for snapshots and fans every frame out to the
/// attached sinks.
pub(crate) struct FrameRelay {
    latest: Mutex<Option<Frame>>,
    sinks: Mutex<Vec<Box<dyn FrameSink>>>,
    ended: AtomicBool,
}

impl FrameRelay {
    pub(crate) fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            sinks: Mutex::new(Vec::new()),
            ended: AtomicBool::new(false),
        }
    }

    pub(crate) fn publish(&self, frame: Frame) {
        if let Ok(mut sinks) = self.sinks.lock() {
            for sink in sinks.iter_mut() {
                sink.render(&frame);
            }
        }
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(frame);
        }
    }

    pub(crate) fn latest(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    pub(crate) fn dimensions(&self) -> Option<(u32, u32)> {
        self.latest
            .lock()
            .ok()
            .and_then(|latest| latest.as_ref().map(|f| (f.width(), f.height())))
    }

    pub(crate) fn attach(&self, sink: Box<dyn FrameSink>) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push(sink);
        }
    }

    pub(crate) fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct CountingSink {
        seen: Arc<Mutex<Vec<u64>>>,
    }

    impl FrameSink for CountingSink {
        fn render(&mut self, frame: &Frame) {
            self.seen.lock().unwrap().push(frame.sequence());
        }
    }

    fn frame(sequence: u64) -> Frame {
        Frame::new(vec![0; 2 * 2 * 3], 2, 2, 3, sequence)
    }

    #[test]
    fn test_empty_relay_has_no_dimensions() {
        let relay = FrameRelay::new();
        assert!(relay.latest().is_none());
        assert!(relay.dimensions().is_none());
        assert!(!relay.is_ended());
    }

    #[test]
    fn test_publish_keeps_latest_and_feeds_sinks() {
        let relay = FrameRelay::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        relay.attach(Box::new(CountingSink { seen: seen.clone() }));

        relay.publish(frame(1));
        relay.publish(frame(2));

        assert_eq!(relay.latest().unwrap().sequence(), 2);
        assert_eq!(relay.dimensions(), Some((2, 2)));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_mark_ended() {
        let relay = FrameRelay::new();
        relay.mark_ended();
        assert!(relay.is_ended());
    }
}
