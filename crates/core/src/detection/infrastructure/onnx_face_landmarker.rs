//! Face landmarker backed by a YOLO face-pose model.
//!
//! The model reports five keypoints per face (eyes, nose tip, mouth corners).
//! There is no lip contour, so one is synthesized from the two mouth corners.
use std::path::Path;

use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::landmark_detector::FaceLandmarkDetector;
use crate::shared::frame::Frame;
use crate::shared::geometry::{NormalizedRect, Point};

use super::yolo::{nms, RawDetection, YoloSession};

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

const NUM_KEYPOINTS: usize = 5;
const LEFT_MOUTH_CORNER: usize = 3;
const RIGHT_MOUTH_CORNER: usize = 4;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// Half the lip height as a fraction of the corner-to-corner distance.
pub const MOUTH_HEIGHT_RATIO: f64 = 0.25;

pub struct OnnxFaceLandmarker {
    session: YoloSession,
    confidence: f64,
}

impl OnnxFaceLandmarker {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = YoloSession::load(model_path)?;
        log::info!(
            "Loaded face model {} ({}px input)",
            model_path.display(),
            session.input_size()
        );
        Ok(Self {
            session,
            confidence,
        })
    }
}

impl FaceLandmarkDetector for OnnxFaceLandmarker {
    fn detect_faces(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
        let mut raw = self.session.infer(frame, NUM_KEYPOINTS, self.confidence)?;
        let kept = nms(&mut raw, NMS_IOU_THRESH);
        Ok(kept
            .iter()
            .filter_map(|det| to_observation(det, frame.width() as f64, frame.height() as f64))
            .collect())
    }
}

/// Converts a pixel-space detection into a normalized face observation.
///
/// Boxes are clipped to the frame; a box with no area left is dropped.
fn to_observation(det: &RawDetection, fw: f64, fh: f64) -> Option<FaceObservation> {
    let x1 = det.x1.clamp(0.0, fw);
    let y1 = det.y1.clamp(0.0, fh);
    let x2 = det.x2.clamp(0.0, fw);
    let y2 = det.y2.clamp(0.0, fh);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let bounding_box = NormalizedRect::new(x1 / fw, y1 / fh, (x2 - x1) / fw, (y2 - y1) / fh);
    let contour = mouth_corners(det).map(|(left, right)| {
        mouth_contour(
            Point::new(left.0 / fw, left.1 / fh),
            Point::new(right.0 / fw, right.1 / fh),
            &bounding_box,
        )
    });

    Some(FaceObservation::new(bounding_box, contour).with_confidence(det.confidence))
}

fn mouth_corners(det: &RawDetection) -> Option<((f64, f64), (f64, f64))> {
    let left = det.keypoints.get(LEFT_MOUTH_CORNER)?;
    let right = det.keypoints.get(RIGHT_MOUTH_CORNER)?;
    if left.2 < KEYPOINT_CONF_THRESH || right.2 < KEYPOINT_CONF_THRESH {
        return None;
    }
    Some(((left.0, left.1), (right.0, right.1)))
}

/// Four-point lip outline (left corner, upper lip, right corner, lower lip)
/// expressed relative to `face`.
///
/// Corners are in normalized frame coordinates. A degenerate face box yields
/// an empty contour.
pub fn mouth_contour(left: Point, right: Point, face: &NormalizedRect) -> Vec<Point> {
    if face.width <= 0.0 || face.height <= 0.0 {
        return Vec::new();
    }
    let cx = (left.x + right.x) / 2.0;
    let cy = (left.y + right.y) / 2.0;
    let half_height = MOUTH_HEIGHT_RATIO * (right.x - left.x).hypot(right.y - left.y);

    [
        left,
        Point::new(cx, cy - half_height),
        right,
        Point::new(cx, cy + half_height),
    ]
    .into_iter()
    .map(|p| Point::new((p.x - face.x) / face.width, (p.y - face.y) / face.height))
    .collect()
}
