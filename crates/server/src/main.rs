mod http;
mod routes;
mod server;
mod watchdog;

use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;

use hautfit_core::camera::domain::frame_source::FrameSource;
use hautfit_core::camera::frame_hub::{FrameHub, FrameHubConfig};
use hautfit_core::camera::infrastructure::ffmpeg_camera_source::{
    default_device, default_format, CameraConfig, FfmpegCameraSource,
};
use hautfit_core::camera::infrastructure::still_image_source::StillImageSource;
use hautfit_core::classification::domain::tone_classifier::ToneClassifier;
use hautfit_core::classification::infrastructure::onnx_tone_model::OnnxToneModel;
use hautfit_core::detection::domain::face_locator::FaceLocator;
use hautfit_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use hautfit_core::estimation::stabilized_estimator::StabilizedEstimator;
use hautfit_core::normalization::region_normalizer::RegionNormalizer;
use hautfit_core::pipeline::start_session_use_case::StartSessionUseCase;
use hautfit_core::session::infrastructure::json_file_session_store::JsonFileSessionStore;
use hautfit_core::session::session_recorder::SessionRecorder;
use hautfit_core::shared::constants::FACE_MODEL_NAME;
use hautfit_core::shared::labels::LabelSet;
use hautfit_core::shared::model_resolver::{self, ModelSource};

use crate::routes::AppState;
use crate::server::HttpServer;

/// Replay rate for `--image-source`.
const STILL_IMAGE_FPS: f64 = 15.0;

/// Live webcam skin-tone analysis server.
#[derive(Parser)]
#[command(name = "hautfit")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:5000")]
    addr: String,

    /// Capture device (e.g. /dev/video0, 0, "video=Integrated Camera").
    #[arg(long, default_value_t = default_device().to_string())]
    camera: String,

    /// libavdevice capture format (v4l2, avfoundation, dshow).
    #[arg(long, default_value_t = default_format().to_string())]
    camera_format: String,

    /// Capture size requested from the camera, as WIDTHxHEIGHT.
    #[arg(long)]
    video_size: Option<String>,

    /// Capture frame rate requested from the camera.
    #[arg(long)]
    camera_fps: Option<u32>,

    /// Replay this still image instead of opening a camera.
    #[arg(long)]
    image_source: Option<PathBuf>,

    /// Skin-tone classifier in ONNX format.
    #[arg(long)]
    tone_model: PathBuf,

    /// BlazeFace short-range ONNX model. Looked up in the model cache when
    /// omitted.
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Where to download the face model from when it is not cached.
    #[arg(long)]
    face_model_url: Option<String>,

    /// Tone labels in model output order (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "dark,mid-dark,mid-light,light")]
    labels: Vec<String>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Frames classified per session.
    #[arg(long, default_value = "5")]
    frame_count: usize,

    /// JSON file holding the session record.
    #[arg(long, default_value = "data.json")]
    data_file: PathBuf,

    /// Directory with index.html and static assets.
    #[arg(long, default_value = "ui")]
    ui_dir: PathBuf,

    /// JPEG quality of the live feed (1-100).
    #[arg(long, default_value = "80")]
    jpeg_quality: u8,

    /// Longest wait for one camera frame, in milliseconds.
    #[arg(long, default_value = "2000")]
    frame_timeout_ms: u64,

    /// Exit when the camera stalls this long with a reader waiting.
    #[arg(long, default_value = "10")]
    stall_limit_secs: u64,

    /// Consecutive read failures before the camera is declared dead.
    #[arg(long, default_value = "5")]
    max_read_failures: usize,
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
    validate(&cli)?;

    let labels = LabelSet::new(cli.labels.iter().map(|l| l.trim().to_string()))?;
    let locator = build_locator(&cli)?.shared();
    let tone_model = OnnxToneModel::new(&cli.tone_model)?;
    let classifier = ToneClassifier::new(Box::new(tone_model), labels)?.shared();

    let hub = Arc::new(FrameHub::spawn(
        open_source(&cli)?,
        FrameHubConfig {
            frame_timeout: Duration::from_millis(cli.frame_timeout_ms),
            max_consecutive_failures: cli.max_read_failures,
            ..FrameHubConfig::default()
        },
    ));
    watchdog::spawn(hub.clone(), Duration::from_secs(cli.stall_limit_secs))?;

    let recorder = Arc::new(SessionRecorder::new(Box::new(JsonFileSessionStore::new(
        &cli.data_file,
    ))));
    let estimator = StabilizedEstimator::new(locator.clone(), RegionNormalizer::default(), classifier);
    let start_session = StartSessionUseCase::new(hub.clone(), estimator, recorder.clone())
        .with_frame_count(cli.frame_count);

    let state = Arc::new(AppState {
        hub,
        locator,
        start_session,
        recorder,
        ui_dir: cli.ui_dir.clone(),
        jpeg_quality: cli.jpeg_quality,
        streams: Mutex::new(Vec::new()),
    });

    let server = HttpServer::bind(&cli.addr, state)?;
    log::info!("Listening on http://{}", server.local_addr()?);
    server.serve()?;
    Ok(())
}

fn build_locator(cli: &Cli) -> Result<FaceLocator, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {FACE_MODEL_NAME}");
    let source = ModelSource {
        name: FACE_MODEL_NAME,
        explicit_path: cli.face_model.as_deref(),
        url: cli.face_model_url.as_deref(),
    };
    let model_path = model_resolver::resolve(&source, Some(Box::new(download_progress)))?;
    log::info!("Face model: {}", model_path.display());

    let detector = OnnxBlazefaceDetector::new(&model_path, cli.confidence)?;
    Ok(FaceLocator::new(Box::new(detector)))
}

fn open_source(cli: &Cli) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.image_source {
        log::info!("Replaying still image {}", path.display());
        return Ok(Box::new(StillImageSource::open(path, STILL_IMAGE_FPS)?));
    }
    Ok(Box::new(FfmpegCameraSource::open(&camera_config(cli))?))
}

fn camera_config(cli: &Cli) -> CameraConfig {
    CameraConfig {
        device: cli.camera.clone(),
        format: cli.camera_format.clone(),
        video_size: cli.video_size.clone(),
        framerate: cli.camera_fps,
    }
}

/// Accepts `WIDTHxHEIGHT` with both sides positive.
fn is_video_size(value: &str) -> bool {
    value
        .split_once('x')
        .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)))
        .is_some_and(|(w, h)| w > 0 && h > 0)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.tone_model.is_file() {
        return Err(format!("Tone model not found: {}", cli.tone_model.display()).into());
    }
    if let Some(path) = &cli.image_source {
        if !path.is_file() {
            return Err(format!("Image source not found: {}", path.display()).into());
        }
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if let Some(size) = &cli.video_size {
        if !is_video_size(size) {
            return Err(format!("Video size must look like 1280x720, got '{size}'").into());
        }
    }
    if cli.camera_fps == Some(0) {
        return Err("Camera fps must be positive".into());
    }
    if cli.frame_count == 0 {
        return Err("Frame count must be at least 1".into());
    }
    if !(1..=100).contains(&cli.jpeg_quality) {
        return Err(format!(
            "JPEG quality must be between 1 and 100, got {}",
            cli.jpeg_quality
        )
        .into());
    }
    if cli.frame_timeout_ms == 0 {
        return Err("Frame timeout must be positive".into());
    }
    if cli.stall_limit_secs.saturating_mul(1000) <= cli.frame_timeout_ms {
        return Err(format!(
            "Stall limit ({}s) must exceed the frame timeout ({}ms)",
            cli.stall_limit_secs, cli.frame_timeout_ms
        )
        .into());
    }
    if cli.max_read_failures == 0 {
        return Err("Max read failures must be at least 1".into());
    }
    if cli.labels.iter().any(|l| l.trim().is_empty()) {
        return Err("Labels must not be empty".into());
    }
    if !cli.ui_dir.is_dir() {
        log::warn!(
            "UI directory {} does not exist; static pages will 404",
            cli.ui_dir.display()
        );
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn cli(extra: &[&str], model: &NamedTempFile) -> Cli {
        let model = model.path().to_str().unwrap().to_string();
        let mut args = vec!["hautfit".to_string(), "--tone-model".into(), model];
        args.extend(extra.iter().map(|s| s.to_string()));
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let model = NamedTempFile::new().unwrap();
        let cli = cli(&[], &model);
        assert_eq!(cli.addr, "0.0.0.0:5000");
        assert_eq!(cli.labels, ["dark", "mid-dark", "mid-light", "light"]);
        assert_eq!(cli.frame_count, 5);
        assert_eq!(cli.jpeg_quality, 80);
        assert_eq!(cli.data_file, PathBuf::from("data.json"));
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn test_tone_model_is_required() {
        assert!(Cli::try_parse_from(["hautfit"]).is_err());
    }

    #[test]
    fn test_missing_tone_model_fails_validation() {
        let cli = Cli::try_parse_from(["hautfit", "--tone-model", "/nonexistent/tone.onnx"]).unwrap();
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_out_of_range_values_fail_validation() {
        let model = NamedTempFile::new().unwrap();
        for extra in [
            &["--confidence", "1.5"][..],
            &["--frame-count", "0"],
            &["--jpeg-quality", "0"],
            &["--stall-limit-secs", "1", "--frame-timeout-ms", "2000"],
            &["--max-read-failures", "0"],
            &["--labels", "dark,,light"],
            &["--video-size", "1280by720"],
            &["--video-size", "0x720"],
            &["--camera-fps", "0"],
        ] {
            assert!(validate(&cli(extra, &model)).is_err(), "{extra:?}");
        }
    }

    #[test]
    fn test_camera_config_carries_capture_settings() {
        let model = NamedTempFile::new().unwrap();
        let custom = cli(
            &["--camera", "/dev/video2", "--video-size", "1280x720", "--camera-fps", "30"],
            &model,
        );
        assert!(validate(&custom).is_ok());
        let config = camera_config(&custom);
        assert_eq!(config.device, "/dev/video2");
        assert_eq!(config.video_size.as_deref(), Some("1280x720"));
        assert_eq!(config.framerate, Some(30));

        let defaults = camera_config(&cli(&[], &model));
        assert_eq!(defaults.video_size, None);
        assert_eq!(defaults.framerate, None);
    }

    #[test]
    fn test_custom_labels() {
        let model = NamedTempFile::new().unwrap();
        let cli = cli(&["--labels", "a,b,c"], &model);
        assert_eq!(cli.labels, ["a", "b", "c"]);
    }
}
