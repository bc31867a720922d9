use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::domain::media_source::{DeviceError, FrameSink, MediaSource};
use crate::camera::domain::stream_handle::StreamHandle;
use crate::encoding::domain::frame_encoder::FrameEncoder;
use crate::encoding::infrastructure::gallery_loader::load_payload;
use crate::recognition::domain::recognition_client::RecognitionClient;
use crate::shared::cancel::CancelToken;
use crate::shared::config::SequencerConfig;
use crate::shared::payload::Payload;

use super::capture_error::CaptureError;
use super::capture_request::{CaptureMode, CaptureRequest, ValidationError};
use super::capture_sequencer::{CaptureSequencer, EventHandler, InFlight, SequencerState};
use super::result_projector::{
    project, project_enrollment, project_failure, project_liveness, DisplayState,
};

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL: Duration = Duration::from_millis(20);

/// One camera, one encoder and one backend, driven by user actions.
///
/// Every action returns `None` when another action is still in flight, and
/// otherwise exactly one [`DisplayState`]. Actions may be issued from any
/// thread; `cancel` and `stop` abort the one in flight.
pub struct CaptureSession {
    source: Mutex<Box<dyn MediaSource>>,
    stream: Mutex<Option<StreamHandle>>,
    encoder: Box<dyn FrameEncoder>,
    client: Box<dyn RecognitionClient>,
    sequencer: CaptureSequencer,
    ready_timeout: Duration,
}

impl CaptureSession {
    pub fn new(
        source: Box<dyn MediaSource>,
        encoder: Box<dyn FrameEncoder>,
        client: Box<dyn RecognitionClient>,
        config: SequencerConfig,
    ) -> Self {
        Self {
            source: Mutex::new(source),
            stream: Mutex::new(None),
            encoder,
            client,
            sequencer: CaptureSequencer::new(config, None),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_event_handler(mut self, on_event: EventHandler) -> Self {
        let config = self.sequencer.config().clone();
        self.sequencer = CaptureSequencer::new(config, Some(on_event));
        self
    }

    /// How long `start` waits for the first decoded frame.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn config(&self) -> &SequencerConfig {
        self.sequencer.config()
    }

    pub fn state(&self) -> SequencerState {
        self.sequencer.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock_stream().is_some()
    }

    /// Acquires the camera. Calling it while already streaming is a no-op.
    pub fn start(&self) -> Result<(), DeviceError> {
        let mut stream = self.lock_stream();
        if stream.is_some() {
            return Ok(());
        }
        let handle = {
            let mut source = self.source.lock().unwrap_or_else(|p| p.into_inner());
            log::info!("Opening camera {}", source.describe());
            source.acquire().map_err(|e| {
                log::warn!("Camera unavailable: {e}");
                e
            })?
        };

        let deadline = Instant::now() + self.ready_timeout;
        while handle.dimensions().is_none() && Instant::now() < deadline {
            thread::sleep(READY_POLL);
        }
        match handle.dimensions() {
            Some((w, h)) => log::info!("Camera streaming at {w}x{h}"),
            None => log::warn!(
                "Camera produced no frame within {}ms",
                self.ready_timeout.as_millis()
            ),
        }
        *stream = Some(handle);
        Ok(())
    }

    /// Binds a preview sink to the running stream.
    pub fn attach_preview(&self, sink: Box<dyn FrameSink>) -> Result<(), DeviceError> {
        let mut stream = self.lock_stream();
        let handle = stream.as_mut().ok_or(DeviceError::NotStarted)?;
        handle.attach(sink);
        Ok(())
    }

    /// Aborts the action in flight, if any. Nothing is uploaded afterwards.
    pub fn cancel(&self) {
        let state = self.sequencer.state();
        if self.sequencer.cancel() {
            log::info!("Cancelled while {state}");
        }
    }

    /// Cancels any action in flight and releases the camera.
    pub fn stop(&self) {
        self.cancel();
        if self.lock_stream().take().is_some() {
            log::info!("Camera released");
        }
    }

    pub fn enroll(&self, request: &CaptureRequest) -> Option<DisplayState> {
        self.run(
            SequencerState::Validating,
            |in_flight, cancel| {
                if request.mode() != CaptureMode::Enroll {
                    return Err(ValidationError::NotEnrollment(request.mode()).into());
                }
                request.validate()?;
                let label = request.label().unwrap_or_default();

                let capture = {
                    let mut stream = self.lock_stream();
                    let handle = stream.as_mut().ok_or(DeviceError::NotStarted)?;
                    in_flight.enter(SequencerState::Capturing);
                    self.sequencer
                        .capture_burst(handle, self.encoder.as_ref(), request, cancel)?
                };
                if let Some(reason) = &capture.interruption {
                    log::warn!(
                        "Uploading {} of {} frames ({reason})",
                        capture.payloads.len(),
                        capture.requested
                    );
                }

                in_flight.enter(SequencerState::Uploading);
                log::info!("Enrolling {label} with {} frames", capture.payloads.len());
                Ok(self.client.enroll(label, &capture.payloads, cancel)?)
            },
            project_enrollment,
        )
    }

    /// Enrolls `label` with the configured frame count and interval.
    pub fn enroll_label(&self, label: &str) -> Option<DisplayState> {
        self.enroll(&CaptureRequest::enroll_with(label, self.config()))
    }

    pub fn recognize(&self) -> Option<DisplayState> {
        self.run(
            SequencerState::CapturingOne,
            |in_flight, cancel| {
                let payload = self.capture_single(&CaptureRequest::recognize(), cancel)?;
                in_flight.enter(SequencerState::Uploading);
                Ok(self.client.recognize(&payload, cancel)?)
            },
            project,
        )
    }

    pub fn test_liveness(&self) -> Option<DisplayState> {
        self.run(
            SequencerState::CapturingOne,
            |in_flight, cancel| {
                let payload = self.capture_single(&CaptureRequest::liveness_test(), cancel)?;
                in_flight.enter(SequencerState::Uploading);
                Ok(self.client.test_liveness(&payload, cancel)?)
            },
            project_liveness,
        )
    }

    /// Recognizes a stored image instead of a live frame. The file is sent
    /// as-is; no camera is needed.
    pub fn recognize_file(&self, path: &Path) -> Option<DisplayState> {
        self.run(
            SequencerState::CapturingOne,
            |in_flight, cancel| {
                let payload = load_payload(path)?;
                cancel.check()?;
                in_flight.enter(SequencerState::Uploading);
                log::info!("Recognizing {} ({} bytes)", path.display(), payload.len());
                Ok(self.client.recognize(&payload, cancel)?)
            },
            project,
        )
    }

    fn capture_single(
        &self,
        request: &CaptureRequest,
        cancel: &CancelToken,
    ) -> Result<Payload, CaptureError> {
        request.validate()?;
        log::info!("Capturing one frame to {}", request.mode());
        let mut stream = self.lock_stream();
        let handle = stream.as_mut().ok_or(DeviceError::NotStarted)?;
        self.sequencer
            .capture_one(handle, self.encoder.as_ref(), cancel)
    }

    fn run<T>(
        &self,
        first: SequencerState,
        action: impl FnOnce(&InFlight<'_>, &CancelToken) -> Result<T, CaptureError>,
        on_success: impl FnOnce(&T) -> DisplayState,
    ) -> Option<DisplayState> {
        let in_flight = self.sequencer.try_begin(first)?;
        let result = action(&in_flight, in_flight.cancel_token()).map_err(CaptureError::flatten);
        drop(in_flight);

        let display = match &result {
            Ok(value) => on_success(value),
            Err(e) => {
                log::warn!("Action failed: {e}");
                project_failure(e)
            }
        };
        log::debug!("Display: {display:?}");
        Some(display)
    }

    fn lock_stream(&self) -> MutexGuard<'_, Option<StreamHandle>> {
        self.stream.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
