mod settings;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread::JoinHandle;

use clap::Parser;
use crossbeam_channel::Receiver;

use mouthwatch_core::detection::infrastructure::onnx_face_landmarker::OnnxFaceLandmarker;
use mouthwatch_core::detection::infrastructure::onnx_hand_pose_detector::{
    self, OnnxHandPoseDetector,
};
use mouthwatch_core::monitor::detection_state::DetectionState;
use mouthwatch_core::monitor::mouth_monitor::{MonitorConfig, MouthMonitor};
use mouthwatch_core::monitor::pipeline_logger::StatsPipelineLogger;
use mouthwatch_core::shared::constants::{
    FACE_MODEL_NAME, FACE_MODEL_URL, HAND_MODEL_NAME, SNAPSHOT_SCALE,
};
use mouthwatch_core::shared::model_resolver::{self, ModelSource};
use mouthwatch_core::snapshot::snapshot_capturer::{default_snapshot_dir, ScaledSnapshotCapturer};
use mouthwatch_core::video::domain::frame_source::FrameSource;
use mouthwatch_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use mouthwatch_core::video::infrastructure::image_file_writer::ImageFileWriter;

use settings::Settings;

/// Watches a video feed and raises an alert when a fingertip reaches the mouth.
#[derive(Parser)]
#[command(name = "mouthwatch")]
struct Cli {
    /// Input video file or capture device.
    input: PathBuf,

    /// Seconds between checks (minimum 0.1). Defaults to the saved setting.
    #[arg(long)]
    check_interval: Option<f64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    face_confidence: Option<f64>,

    /// Fingertips at or below this confidence are ignored (0.0-1.0).
    #[arg(long)]
    fingertip_confidence: Option<f32>,

    /// Face keypoint model: local path or download URL.
    #[arg(long)]
    face_model: Option<String>,

    /// Hand keypoint model: local path or download URL.
    #[arg(long)]
    hand_model: Option<String>,

    /// Directory alert snapshots are written to.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Linear scale of alert snapshots, in (0, 1].
    #[arg(long, default_value_t = SNAPSHOT_SCALE)]
    snapshot_scale: f64,

    /// Decode as fast as possible instead of at the stream's frame rate.
    #[arg(long)]
    no_realtime: bool,

    /// Store the effective options as the new defaults.
    #[arg(long)]
    save_settings: bool,
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
    let settings = merge_settings(&cli, Settings::load());
    validate(&cli, &settings)?;

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }

    let config = MonitorConfig {
        check_interval: settings.check_interval,
        fingertip_confidence: settings.fingertip_confidence,
        ..MonitorConfig::default()
    };
    config.validate()?;

    let face_path = model_resolver::resolve(
        FACE_MODEL_NAME,
        &model_source(cli.face_model.as_deref(), Some(FACE_MODEL_URL)),
        None,
        Some(Box::new(|d, t| download_progress("face", d, t))),
    )?;
    let hand_path = model_resolver::resolve(
        HAND_MODEL_NAME,
        &model_source(settings.hand_model.as_deref(), None),
        None,
        Some(Box::new(|d, t| download_progress("hand", d, t))),
    )?;
    eprintln!();

    let face_detector = OnnxFaceLandmarker::new(&face_path, settings.face_confidence)?;
    let hand_detector =
        OnnxHandPoseDetector::new(&hand_path, onnx_hand_pose_detector::DEFAULT_CONFIDENCE)?;

    let snapshot_dir = settings
        .snapshot_dir
        .clone()
        .or_else(default_snapshot_dir)
        .ok_or("could not determine a snapshot directory, pass --snapshot-dir")?;
    let capturer = ScaledSnapshotCapturer::new(cli.snapshot_scale)?
        .with_archive(&snapshot_dir, Box::new(ImageFileWriter::new()));
    log::info!("Alert snapshots go to {}", snapshot_dir.display());

    let mut source = FfmpegFrameSource::open(&cli.input, !cli.no_realtime)?;
    let mut monitor = MouthMonitor::start(
        config,
        Box::new(face_detector),
        Box::new(hand_detector),
        Box::new(capturer),
        Box::new(StatsPipelineLogger::new()),
    )?;
    let reporter = spawn_reporter(monitor.subscribe())?;

    source.start(monitor.frame_sink())?;
    source.wait();

    monitor.cleanup();
    let alerts = monitor.state().alert_count();
    drop(monitor);
    if reporter.join().is_err() {
        log::warn!("Reporter thread panicked");
    }
    log::info!("Done: {alerts} alert(s)");
    Ok(())
}

/// Flags win over saved settings.
fn merge_settings(cli: &Cli, mut settings: Settings) -> Settings {
    if let Some(v) = cli.check_interval {
        settings.check_interval = v;
    }
    if let Some(v) = cli.face_confidence {
        settings.face_confidence = v;
    }
    if let Some(v) = cli.fingertip_confidence {
        settings.fingertip_confidence = v;
    }
    if let Some(dir) = &cli.snapshot_dir {
        settings.snapshot_dir = Some(dir.clone());
    }
    if let Some(model) = &cli.hand_model {
        settings.hand_model = Some(model.clone());
    }
    settings
}

fn validate(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&settings.face_confidence) {
        return Err(format!(
            "Face confidence must be between 0.0 and 1.0, got {}",
            settings.face_confidence
        )
        .into());
    }
    if !(0.0..1.0).contains(&settings.fingertip_confidence) {
        return Err(format!(
            "Fingertip confidence must be at least 0.0 and below 1.0, got {}",
            settings.fingertip_confidence
        )
        .into());
    }
    if settings.hand_model.is_none() {
        return Err("A hand model is required: pass --hand-model <path or URL>".into());
    }
    if cli.input.as_os_str().is_empty() {
        return Err("Input must not be empty".into());
    }
    Ok(())
}

/// Anything with a URL scheme is downloaded, everything else is a local file.
fn model_source(location: Option<&str>, default_url: Option<&str>) -> ModelSource {
    match location {
        Some(s) if s.starts_with("http://") || s.starts_with("https://") => ModelSource {
            path: None,
            url: Some(s.to_string()),
        },
        Some(s) => ModelSource {
            path: Some(PathBuf::from(s)),
            url: None,
        },
        None => ModelSource {
            path: None,
            url: default_url.map(str::to_string),
        },
    }
}

/// Logs contact edges and archived snapshots until the monitor goes away.
fn spawn_reporter(updates: Receiver<Arc<DetectionState>>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("reporter".into())
        .spawn(move || {
            let mut in_mouth = false;
            let mut last_snapshot = None;
            for state in updates {
                if state.hand_in_mouth() != in_mouth {
                    in_mouth = state.hand_in_mouth();
                    if in_mouth {
                        log::warn!("Hand at mouth (alert #{})", state.alert_count());
                    } else {
                        log::info!("Hand left mouth");
                    }
                }
                if let Some(snapshot) = state.last_alert_snapshot() {
                    if last_snapshot != Some(snapshot.frame_index) {
                        last_snapshot = Some(snapshot.frame_index);
                        match &snapshot.saved_to {
                            Some(path) => log::info!("Snapshot saved to {}", path.display()),
                            None => log::info!("Snapshot taken of frame {}", snapshot.frame_index),
                        }
                    }
                }
            }
        })
}

fn download_progress(what: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {what} model... {pct}%");
    } else {
        eprint!("\rDownloading {what} model... {downloaded} bytes");
    }
}
