use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::camera::domain::media_source::{DeviceError, FrameSink, MediaSource, VideoStream};
use crate::camera::domain::stream_handle::{DeviceLock, StreamHandle};
use crate::camera::infrastructure::frame_relay::FrameRelay;
use crate::shared::frame::Frame;

#[cfg(target_os = "linux")]
const DEFAULT_FORMAT: &str = "video4linux2";
#[cfg(target_os = "linux")]
const DEFAULT_DEVICE: &str = "/dev/video0";

#[cfg(target_os = "macos")]
const DEFAULT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "macos")]
const DEFAULT_DEVICE: &str = "0";

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const DEFAULT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const DEFAULT_DEVICE: &str = "video=Integrated Camera";

/// Device settings passed to the capture thread.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraParams {
    pub device: String,
    /// libavdevice input format name, e.g. `video4linux2` or `avfoundation`.
    pub format: String,
    pub video_size: Option<(u32, u32)>,
    pub framerate: Option<u32>,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            format: DEFAULT_FORMAT.to_string(),
            video_size: None,
            framerate: None,
        }
    }
}

/// Live camera input via ffmpeg-next's device layer (libavdevice).
///
/// Each acquisition opens the device on a dedicated decode thread that
/// converts frames to RGB24 and publishes them to a [`FrameRelay`]. The call
/// blocks until the device either opened or failed, which covers any
/// operating-system permission prompt.
pub struct FfmpegCameraSource {
    params: CameraParams,
    lock: DeviceLock,
}

impl FfmpegCameraSource {
    pub fn new(params: CameraParams) -> Self {
        Self {
            params,
            lock: DeviceLock::new(),
        }
    }
}

impl Default for FfmpegCameraSource {
    fn default() -> Self {
        Self::new(CameraParams::default())
    }
}

impl MediaSource for FfmpegCameraSource {
    fn acquire(&mut self) -> Result<StreamHandle, DeviceError> {
        let lease = self.lock.try_lease()?;
        let relay = Arc::new(FrameRelay::new());
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let params = self.params.clone();
        let thread_relay = relay.clone();
        let thread_running = running.clone();
        let worker = thread::Builder::new()
            .name("camera-decode".to_string())
            .spawn(move || run_capture(&params, &thread_relay, &thread_running, ready_tx))
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("Camera {} streaming", self.describe());
                let stream = FfmpegCameraStream {
                    relay,
                    running,
                    worker: Some(worker),
                    next_sequence: 0,
                };
                Ok(StreamHandle::new(Box::new(stream), lease))
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(DeviceError::Backend(
                    "capture thread exited during startup".to_string(),
                ))
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.params.device, self.params.format)
    }
}

struct FfmpegCameraStream {
    relay: Arc<FrameRelay>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    next_sequence: u64,
}

impl VideoStream for FfmpegCameraStream {
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.relay.dimensions()
    }

    fn snapshot(&mut self) -> Result<Frame, DeviceError> {
        if self.relay.is_ended() {
            return Err(DeviceError::StreamEnded);
        }
        let latest = self.relay.latest().ok_or(DeviceError::NotStarted)?;
        let frame = Frame::new(
            latest.data().to_vec(),
            latest.width(),
            latest.height(),
            latest.channels(),
            self.next_sequence,
        );
        self.next_sequence += 1;
        Ok(frame)
    }

    fn attach(&mut self, sink: Box<dyn FrameSink>) {
        self.relay.attach(sink);
    }
}

impl Drop for FfmpegCameraStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_capture(
    params: &CameraParams,
    relay: &FrameRelay,
    running: &AtomicBool,
    ready: Sender<Result<(), DeviceError>>,
) {
    let mut ictx = match open_device(params) {
        Ok(ictx) => ictx,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    if let Err(e) = decode_frames(&mut ictx, relay, running) {
        log::warn!("Camera stream stopped: {e}");
    }
    relay.mark_ended();
}

fn open_device(params: &CameraParams) -> Result<ffmpeg_next::format::context::Input, DeviceError> {
    ffmpeg_next::init().map_err(|e| DeviceError::Backend(e.to_string()))?;
    ffmpeg_next::device::register_all();

    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == params.format)
        .ok_or_else(|| {
            DeviceError::Backend(format!("capture format '{}' not available", params.format))
        })?;

    let mut options = ffmpeg_next::Dictionary::new();
    if let Some((w, h)) = params.video_size {
        options.set("video_size", &format!("{w}x{h}"));
    }
    if let Some(fps) = params.framerate {
        options.set("framerate", &fps.to_string());
    }

    let context = ffmpeg_next::format::open_with(
        &params.device,
        &ffmpeg_next::format::format::Format::Input(format),
        options,
    )
    .map_err(|e| classify_open_error(&params.device, e))?;

    Ok(context.input())
}

fn classify_open_error(device: &str, error: ffmpeg_next::Error) -> DeviceError {
    if let ffmpeg_next::Error::Other { errno } = error {
        match io::Error::from_raw_os_error(errno).kind() {
            io::ErrorKind::PermissionDenied => {
                return DeviceError::PermissionDenied(device.to_string())
            }
            io::ErrorKind::NotFound => return DeviceError::NotFound(device.to_string()),
            _ => {}
        }
    }
    DeviceError::Backend(format!("{device}: {error}"))
}

fn decode_frames(
    ictx: &mut ffmpeg_next::format::context::Input,
    relay: &FrameRelay,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("Device has no video stream")?;
    let video_stream_index = stream.index();
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let mut decoder = codec_ctx.decoder().video()?;

    // Some devices only report their pixel format once the first frame decodes.
    let mut scaler: Option<ffmpeg_next::software::scaling::Context> = None;
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    let mut sequence = 0u64;

    for (stream, packet) in ictx.packets() {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        if stream.index() != video_stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            let width = decoded.width();
            let height = decoded.height();
            if scaler.is_none() {
                scaler = Some(ffmpeg_next::software::scaling::Context::get(
                    decoded.format(),
                    width,
                    height,
                    ffmpeg_next::format::Pixel::RGB24,
                    width,
                    height,
                    ffmpeg_next::software::scaling::Flags::BILINEAR,
                )?);
            }
            let Some(scaler) = scaler.as_mut() else {
                continue;
            };
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&decoded, &mut rgb_frame)?;
            let pixels = extract_rgb_pixels(&rgb_frame, width, height);
            relay.publish(Frame::new(pixels, width, height, 3, sequence));
            sequence += 1;
        }
    }
    Ok(())
}

/// Copies RGB24 rows out of a frame whose stride may include padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
