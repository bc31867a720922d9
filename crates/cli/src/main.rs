use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use facecapture_core::camera::domain::media_source::MediaSource;
use facecapture_core::camera::infrastructure::ffmpeg_camera_source::{
    CameraParams, FfmpegCameraSource,
};
use facecapture_core::camera::infrastructure::preview_file_sink::PreviewFileSink;
use facecapture_core::camera::infrastructure::still_image_source::StillImageSource;
use facecapture_core::encoding::infrastructure::jpeg_frame_encoder::JpegFrameEncoder;
use facecapture_core::pipeline::capture_request::CaptureRequest;
use facecapture_core::pipeline::capture_sequencer::{SequencerState, SessionEvent};
use facecapture_core::pipeline::capture_session::CaptureSession;
use facecapture_core::pipeline::result_projector::DisplayState;
use facecapture_core::recognition::domain::identity_registry::{IdentityRegistry, UserReport};
use facecapture_core::recognition::infrastructure::http_recognition_client::HttpRecognitionClient;
use facecapture_core::shared::config::{ClientConfig, SequencerConfig};
use facecapture_core::shared::constants::{DEFAULT_ENROLL_FRAMES, DEFAULT_INTERVAL_MS};

/// Enroll and recognize faces from a live camera against a recognition server.
#[derive(Parser)]
#[command(name = "facecapture")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Recognition server base URL (overrides FACECAPTURE_SERVER_URL).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true, default_value = "30")]
    timeout_secs: u64,

    /// Retries for requests that fail to reach the server.
    #[arg(long, global = true, default_value = "0")]
    retries: u32,

    /// Camera device (platform default if omitted).
    #[arg(long, global = true)]
    device: Option<String>,

    /// FFmpeg input format for the camera (e.g. video4linux2, avfoundation).
    #[arg(long, global = true)]
    format: Option<String>,

    /// Requested camera resolution, e.g. 1280x720.
    #[arg(long, global = true, value_parser = parse_video_size)]
    video_size: Option<(u32, u32)>,

    /// Requested camera frame rate.
    #[arg(long, global = true)]
    framerate: Option<u32>,

    /// Use a still image as the camera instead of a live device.
    #[arg(long, global = true)]
    still_image: Option<PathBuf>,

    /// Keep a JPEG of the live feed at this path while capturing.
    #[arg(long, global = true)]
    preview: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a burst of frames and enroll them under a name.
    Enroll {
        name: String,

        /// Number of frames to capture.
        #[arg(long, default_value_t = DEFAULT_ENROLL_FRAMES)]
        frames: u32,

        /// Milliseconds between frames.
        #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
        interval_ms: u64,

        /// Smallest interrupted burst that is still uploaded.
        #[arg(long, default_value = "1")]
        min_frames: u32,
    },
    /// Capture one frame and identify the person in it.
    Recognize,
    /// Capture one frame and run a liveness check on it.
    Liveness,
    /// Identify the person in a stored image file.
    Upload { path: PathBuf },
    /// List enrolled users.
    Users {
        #[arg(long, default_value = "10")]
        limit: u32,

        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Delete every enrollment for a name.
    Delete { name: String },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = HttpRecognitionClient::new(client_config(&cli))?;
    log::info!("Using recognition server {}", client.config().server_url);

    match &cli.command {
        Command::Users { limit, page } => list_users(&client, *limit, *page),
        Command::Delete { name } => {
            let remaining = client.delete_user(name)?;
            println!("Deleted {name}; {remaining} users remain");
            Ok(())
        }
        Command::Upload { path } => {
            let session = build_session(&cli, client, SequencerConfig::default());
            report(session.recognize_file(path))
        }
        Command::Enroll {
            name,
            frames,
            interval_ms,
            min_frames,
        } => {
            let config = SequencerConfig {
                enroll_frames: *frames,
                interval: Duration::from_millis(*interval_ms),
                min_partial_frames: *min_frames,
                ..SequencerConfig::default()
            };
            config.validate()?;
            let request = CaptureRequest::enroll(name.as_str(), *frames, config.interval);
            let session = start_session(&cli, client, config)?;
            report(session.enroll(&request))
        }
        Command::Recognize => {
            let session = start_session(&cli, client, SequencerConfig::default())?;
            report(session.recognize())
        }
        Command::Liveness => {
            let session = start_session(&cli, client, SequencerConfig::default())?;
            report(session.test_liveness())
        }
    }
}

fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    config.timeout = Duration::from_secs(cli.timeout_secs);
    config.max_retries = cli.retries;
    config
}

fn build_session(
    cli: &Cli,
    client: HttpRecognitionClient,
    config: SequencerConfig,
) -> CaptureSession {
    CaptureSession::new(
        build_source(cli),
        Box::new(JpegFrameEncoder::new()),
        Box::new(client),
        config,
    )
    .with_event_handler(Box::new(show_progress))
}

fn start_session(
    cli: &Cli,
    client: HttpRecognitionClient,
    config: SequencerConfig,
) -> Result<CaptureSession, Box<dyn std::error::Error>> {
    let session = build_session(cli, client, config);
    session.start()?;
    if let Some(path) = &cli.preview {
        session.attach_preview(Box::new(PreviewFileSink::new(path)))?;
        log::info!("Writing live preview to {}", path.display());
    }
    Ok(session)
}

fn build_source(cli: &Cli) -> Box<dyn MediaSource> {
    if let Some(path) = &cli.still_image {
        return Box::new(StillImageSource::new(path));
    }
    let mut params = CameraParams::default();
    if let Some(device) = &cli.device {
        params.device = device.clone();
    }
    if let Some(format) = &cli.format {
        params.format = format.clone();
    }
    params.video_size = cli.video_size;
    params.framerate = cli.framerate;
    Box::new(FfmpegCameraSource::new(params))
}

fn show_progress(event: &SessionEvent) {
    match event {
        SessionEvent::FrameCaptured {
            captured,
            requested,
        } => eprint!("\rCaptured frame {captured}/{requested}"),
        SessionEvent::State(SequencerState::Uploading) => {
            eprintln!();
            eprint!("Uploading...");
        }
        SessionEvent::State(SequencerState::Idle) => eprintln!(),
        SessionEvent::State(_) => {}
    }
}

fn report(state: Option<DisplayState>) -> Result<(), Box<dyn std::error::Error>> {
    match state {
        Some(DisplayState::Failed(message)) => Err(message.into()),
        Some(state @ DisplayState::Rejected(_)) => {
            println!("{state}");
            Err("liveness check failed".into())
        }
        Some(state) => {
            println!("{state}");
            Ok(())
        }
        None => Err("another capture is already in progress".into()),
    }
}

fn list_users(
    registry: &dyn IdentityRegistry,
    limit: u32,
    page: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = registry.list_users(limit, page)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &UserReport) {
    println!(
        "{} users, {} embeddings",
        report.total_users, report.total_embeddings
    );
    for user in &report.users {
        println!(
            "  {:<24} {:>5} images {:>5} embeddings  last trained {}",
            user.user_name,
            user.total_images,
            user.embedding_count,
            user.last_training.as_deref().unwrap_or("never")
        );
    }
    let p = &report.pagination;
    match report.row_range() {
        Some((first, last)) => println!(
            "Showing {first}-{last} (page {} of {})",
            p.page, p.total_pages
        ),
        None => println!("Page {} of {} is empty", p.page, p.total_pages),
    }
}

fn parse_video_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("invalid dimension '{v}' in '{s}'"))
    };
    Ok((parse(w)?, parse(h)?))
}
