use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::camera::domain::stream_handle::StreamHandle;
use crate::encoding::domain::frame_encoder::{capture, FrameEncoder};
use crate::shared::cancel::CancelToken;
use crate::shared::config::SequencerConfig;
use crate::shared::constants::SNAPSHOT_FILENAME;
use crate::shared::payload::Payload;

use super::capture_error::CaptureError;
use super::capture_request::{CaptureRequest, CaptureResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Validating,
    Capturing,
    CapturingOne,
    Uploading,
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequencerState::Idle => "idle",
            SequencerState::Validating => "validating",
            SequencerState::Capturing => "capturing",
            SequencerState::CapturingOne => "capturing one",
            SequencerState::Uploading => "uploading",
        };
        f.write_str(name)
    }
}

/// Progress notifications emitted while an action runs.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    State(SequencerState),
    FrameCaptured { captured: u32, requested: u32 },
}

pub type EventHandler = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Drives capture actions and enforces that at most one is in flight.
pub struct CaptureSequencer {
    state: Mutex<SequencerState>,
    active: Mutex<Option<CancelToken>>,
    config: SequencerConfig,
    on_event: Option<EventHandler>,
}

impl CaptureSequencer {
    pub fn new(config: SequencerConfig, on_event: Option<EventHandler>) -> Self {
        Self {
            state: Mutex::new(SequencerState::Idle),
            active: Mutex::new(None),
            config,
            on_event,
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn state(&self) -> SequencerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Claims the sequencer for one action, entering `first`.
    ///
    /// Returns `None` while another action is in flight; the state and the
    /// running action's cancel token are left untouched in that case. The
    /// new action's token is installed before `first` is announced, so a
    /// `cancel` issued from any event handler reaches it. The sequencer
    /// returns to `Idle` when the guard drops, whatever the outcome.
    pub fn try_begin(&self, first: SequencerState) -> Option<InFlight<'_>> {
        let cancel = CancelToken::new();
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if *state != SequencerState::Idle {
                log::debug!("Ignoring action while {state}");
                return None;
            }
            *state = first;
            *self.lock_active() = Some(cancel.clone());
        }
        log::debug!("Sequencer: idle -> {first}");
        self.emit(&SessionEvent::State(first));
        Some(InFlight {
            sequencer: self,
            cancel,
        })
    }

    /// Cancels the action in flight. Returns `false` when there is none.
    pub fn cancel(&self) -> bool {
        match self.lock_active().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Captures `request.frame_count()` frames, waiting `request.interval()`
    /// before each one.
    ///
    /// A device or encode failure ends the loop early. The frames captured so
    /// far are kept if there are at least `min_partial_frames` of them;
    /// otherwise the whole capture fails. Cancellation discards everything.
    pub fn capture_burst(
        &self,
        handle: &mut StreamHandle,
        encoder: &dyn FrameEncoder,
        request: &CaptureRequest,
        cancel: &CancelToken,
    ) -> Result<CaptureResult, CaptureError> {
        let requested = request.frame_count();
        let mut payloads = Vec::with_capacity(requested as usize);
        let mut interruption = None;

        for index in 1..=requested {
            cancel.wait(request.interval())?;
            let step = capture(handle)
                .and_then(|frame| encoder.serialize(&frame, self.config.enroll_quality));
            match step {
                Ok(payload) => {
                    payloads.push(payload.with_filename(format!("image{index}.jpg")));
                    self.emit(&SessionEvent::FrameCaptured {
                        captured: index,
                        requested,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "Capture stopped after {} of {requested} frames: {e}",
                        payloads.len()
                    );
                    interruption = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = interruption {
            let minimum = self.config.min_partial_frames.max(1);
            if (payloads.len() as u32) < minimum {
                return Err(CaptureError::Incomplete {
                    captured: payloads.len(),
                    requested,
                    minimum,
                    reason: e.to_string(),
                });
            }
            return Ok(CaptureResult {
                payloads,
                requested,
                interruption: Some(e.to_string()),
            });
        }

        Ok(CaptureResult {
            payloads,
            requested,
            interruption: None,
        })
    }

    /// Captures and encodes a single frame for recognition or liveness.
    pub fn capture_one(
        &self,
        handle: &mut StreamHandle,
        encoder: &dyn FrameEncoder,
        cancel: &CancelToken,
    ) -> Result<Payload, CaptureError> {
        cancel.check()?;
        let frame = capture(handle)?;
        let payload = encoder.serialize(&frame, self.config.recognize_quality)?;
        self.emit(&SessionEvent::FrameCaptured {
            captured: 1,
            requested: 1,
        });
        Ok(payload.with_filename(SNAPSHOT_FILENAME))
    }

    fn transition(&self, next: SequencerState) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *state, next)
        };
        if previous != next {
            log::debug!("Sequencer: {previous} -> {next}");
            self.emit(&SessionEvent::State(next));
        }
    }

    fn emit(&self, event: &SessionEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(event);
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Exclusive claim on the sequencer for the duration of one action.
pub struct InFlight<'a> {
    sequencer: &'a CaptureSequencer,
    cancel: CancelToken,
}

impl InFlight<'_> {
    pub fn enter(&self, state: SequencerState) {
        self.sequencer.transition(state);
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.sequencer.lock_active() = None;
        self.sequencer.transition(SequencerState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::media_source::{DeviceError, FrameSink, VideoStream};
    use crate::camera::domain::stream_handle::DeviceLock;
    use crate::encoding::domain::frame_encoder::EncodeError;
    use crate::shared::cancel::Cancelled;
    use crate::shared::frame::Frame;
    use std::sync::{Arc, OnceLock, Weak};
    use std::time::{Duration, Instant};

    // ── Stubs ──

    /// Yields `frames` good frames, then fails with `then`.
    struct ScriptedStream {
        remaining: usize,
        then: DeviceError,
        sequence: u64,
    }

    impl ScriptedStream {
        fn endless() -> Self {
            Self::failing_after(usize::MAX, DeviceError::StreamEnded)
        }

        fn failing_after(remaining: usize, then: DeviceError) -> Self {
            Self {
                remaining,
                then,
                sequence: 0,
            }
        }
    }

    impl VideoStream for ScriptedStream {
        fn dimensions(&self) -> Option<(u32, u32)> {
            Some((4, 4))
        }

        fn snapshot(&mut self) -> Result<Frame, DeviceError> {
            if self.remaining == 0 {
                return Err(self.then.clone());
            }
            self.remaining -= 1;
            self.sequence += 1;
            Ok(Frame::new(vec![128; 4 * 4 * 3], 4, 4, 3, self.sequence))
        }

        fn attach(&mut self, _sink: Box<dyn FrameSink>) {}
    }

    /// Records the quality it was asked for; payload bytes carry the frame sequence.
    struct RecordingEncoder {
        qualities: Mutex<Vec<f32>>,
    }

    impl RecordingEncoder {
        fn new() -> Self {
            Self {
                qualities: Mutex::new(Vec::new()),
            }
        }
    }

    impl FrameEncoder for RecordingEncoder {
        fn serialize(&self, frame: &Frame, quality: f32) -> Result<Payload, EncodeError> {
            self.qualities.lock().unwrap().push(quality);
            Ok(Payload::new(
                vec![frame.sequence() as u8],
                "image/jpeg",
                "frame.jpg",
            ))
        }
    }

    fn handle_for(stream: ScriptedStream) -> StreamHandle {
        let lease = DeviceLock::new().try_lease().unwrap();
        StreamHandle::new(Box::new(stream), lease)
    }

    type Events = Arc<Mutex<Vec<SessionEvent>>>;

    fn recording_sequencer(config: SequencerConfig) -> (CaptureSequencer, Events) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let sequencer = CaptureSequencer::new(
            config,
            Some(Box::new(move |e: &SessionEvent| sink.lock().unwrap().push(e.clone()))),
        );
        (sequencer, events)
    }

    fn fast_enroll(count: u32) -> CaptureRequest {
        CaptureRequest::enroll("alice", count, Duration::from_millis(5))
    }

    // ── In-flight guard ──

    #[test]
    fn test_second_begin_is_refused_while_in_flight() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let guard = sequencer.try_begin(SequencerState::Validating).unwrap();
        guard.enter(SequencerState::Capturing);

        assert!(sequencer.try_begin(SequencerState::CapturingOne).is_none());
        assert_eq!(sequencer.state(), SequencerState::Capturing);

        drop(guard);
        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert!(sequencer.try_begin(SequencerState::CapturingOne).is_some());
    }

    #[test]
    fn test_refused_begin_keeps_running_action_cancellable() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let guard = sequencer.try_begin(SequencerState::Validating).unwrap();
        assert!(sequencer.try_begin(SequencerState::CapturingOne).is_none());

        assert!(sequencer.cancel());
        assert!(guard.cancel_token().is_cancelled());

        drop(guard);
        assert!(!sequencer.cancel());
    }

    #[test]
    fn test_cancel_from_first_state_event_reaches_the_action() {
        let slot: Arc<OnceLock<Weak<CaptureSequencer>>> = Arc::new(OnceLock::new());
        let hook = slot.clone();
        let sequencer = Arc::new(CaptureSequencer::new(
            SequencerConfig::default(),
            Some(Box::new(move |e: &SessionEvent| {
                if *e == SessionEvent::State(SequencerState::Validating) {
                    if let Some(sequencer) = hook.get().and_then(Weak::upgrade) {
                        assert!(sequencer.cancel());
                    }
                }
            })),
        ));
        slot.set(Arc::downgrade(&sequencer)).unwrap();

        let guard = sequencer.try_begin(SequencerState::Validating).unwrap();
        assert!(guard.cancel_token().is_cancelled());
        assert_eq!(guard.cancel_token().check(), Err(Cancelled));
    }

    #[test]
    fn test_transitions_are_reported_in_order() {
        let (sequencer, events) = recording_sequencer(SequencerConfig::default());
        {
            let guard = sequencer.try_begin(SequencerState::CapturingOne).unwrap();
            guard.enter(SequencerState::Uploading);
        }
        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                SessionEvent::State(SequencerState::CapturingOne),
                SessionEvent::State(SequencerState::Uploading),
                SessionEvent::State(SequencerState::Idle),
            ]
        );
    }

    // ── Burst capture ──

    #[test]
    fn test_burst_captures_requested_frames_in_order() {
        let (sequencer, events) = recording_sequencer(SequencerConfig::default());
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::endless());

        let result = sequencer
            .capture_burst(&mut handle, &encoder, &fast_enroll(3), &CancelToken::new())
            .unwrap();

        assert!(!result.is_partial());
        let names: Vec<&str> = result.payloads.iter().map(|p| p.filename()).collect();
        assert_eq!(names, vec!["image1.jpg", "image2.jpg", "image3.jpg"]);
        let sequences: Vec<u8> = result.payloads.iter().map(|p| p.bytes()[0]).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(events.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_burst_uses_enroll_quality() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::endless());

        sequencer
            .capture_burst(&mut handle, &encoder, &fast_enroll(2), &CancelToken::new())
            .unwrap();

        assert_eq!(*encoder.qualities.lock().unwrap(), vec![0.8, 0.8]);
    }

    #[test]
    fn test_burst_waits_interval_before_each_frame() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::endless());
        let request = CaptureRequest::enroll("alice", 3, Duration::from_millis(20));

        let start = Instant::now();
        sequencer
            .capture_burst(&mut handle, &encoder, &request, &CancelToken::new())
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_interrupted_burst_keeps_prefix() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::failing_after(2, DeviceError::StreamEnded));

        let result = sequencer
            .capture_burst(&mut handle, &encoder, &fast_enroll(5), &CancelToken::new())
            .unwrap();

        assert!(result.is_partial());
        assert_eq!(result.payloads.len(), 2);
        assert_eq!(result.requested, 5);
        assert!(result.interruption.is_some());
    }

    #[test]
    fn test_interrupted_burst_below_minimum_fails() {
        let config = SequencerConfig {
            min_partial_frames: 3,
            ..SequencerConfig::default()
        };
        let sequencer = CaptureSequencer::new(config, None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::failing_after(2, DeviceError::StreamEnded));

        let err = sequencer
            .capture_burst(&mut handle, &encoder, &fast_enroll(5), &CancelToken::new())
            .unwrap_err();

        assert!(matches!(
            err,
            CaptureError::Incomplete {
                captured: 2,
                requested: 5,
                minimum: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_burst_failing_on_first_frame_fails() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::failing_after(0, DeviceError::StreamEnded));

        let err = sequencer
            .capture_burst(&mut handle, &encoder, &fast_enroll(3), &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, CaptureError::Incomplete { captured: 0, .. }));
    }

    #[test]
    fn test_cancelled_burst_returns_cancelled() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::endless());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = sequencer
            .capture_burst(&mut handle, &encoder, &fast_enroll(3), &cancel)
            .unwrap_err();

        assert_eq!(err, CaptureError::Cancelled);
        assert!(encoder.qualities.lock().unwrap().is_empty());
    }

    // ── Single shot ──

    #[test]
    fn test_capture_one_uses_recognize_quality_and_snapshot_name() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::endless());

        let payload = sequencer
            .capture_one(&mut handle, &encoder, &CancelToken::new())
            .unwrap();

        assert_eq!(payload.filename(), "snapshot.jpg");
        assert_eq!(*encoder.qualities.lock().unwrap(), vec![0.9]);
    }

    #[test]
    fn test_capture_one_surfaces_device_error() {
        let sequencer = CaptureSequencer::new(SequencerConfig::default(), None);
        let encoder = RecordingEncoder::new();
        let mut handle = handle_for(ScriptedStream::failing_after(0, DeviceError::StreamEnded));

        let err = sequencer
            .capture_one(&mut handle, &encoder, &CancelToken::new())
            .unwrap_err();

        assert_eq!(
            err,
            CaptureError::Encode(EncodeError::Device(DeviceError::StreamEnded))
        );
    }
}
