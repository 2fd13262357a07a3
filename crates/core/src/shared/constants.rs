use std::time::Duration;

pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Hand keypoint model (21 keypoints per hand). No public default location,
/// so it must be supplied by path or URL.
pub const HAND_MODEL_NAME: &str = "yolo11n-pose_hands.onnx";

/// Seconds between sampling ticks when nothing else is configured.
pub const DEFAULT_CHECK_INTERVAL_SECS: f64 = 2.0;

/// Shortest sampling interval the timer accepts.
pub const MIN_CHECK_INTERVAL_SECS: f64 = 0.1;

/// How long after losing a face the sampler keeps throttling.
pub const FACE_DETECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// While throttled, one admitted frame in this many is processed.
pub const THROTTLED_KEEP_ONE_IN: u32 = 4;

/// Fingertips at or below this confidence are ignored.
pub const FINGERTIP_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// Hands tracked per frame.
pub const MAX_TRACKED_HANDS: usize = 1;

/// Linear scale applied to alert snapshots.
pub const SNAPSHOT_SCALE: f64 = 0.5;
