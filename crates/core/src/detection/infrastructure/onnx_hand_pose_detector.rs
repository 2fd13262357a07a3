//! Hand pose detector backed by a YOLO hand-keypoint model (21 joints per hand).
use std::path::Path;

use crate::detection::domain::hand_observation::{Fingertip, FingertipPoint, HandObservation};
use crate::detection::domain::landmark_detector::HandPoseDetector;
use crate::shared::frame::Frame;
use crate::shared::geometry::Point;

use super::yolo::{nms, RawDetection, YoloSession};

pub const DEFAULT_CONFIDENCE: f64 = 0.3;

const NMS_IOU_THRESH: f64 = 0.45;

const NUM_KEYPOINTS: usize = 21;

/// Keypoint indices of the fingertips, thumb to little finger.
const FINGERTIP_INDICES: [usize; 5] = [4, 8, 12, 16, 20];

pub struct OnnxHandPoseDetector {
    session: YoloSession,
    confidence: f64,
}

impl OnnxHandPoseDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = YoloSession::load(model_path)?;
        log::info!(
            "Loaded hand model {} ({}px input)",
            model_path.display(),
            session.input_size()
        );
        Ok(Self {
            session,
            confidence,
        })
    }
}

impl HandPoseDetector for OnnxHandPoseDetector {
    fn detect_hands(
        &mut self,
        frame: &Frame,
        max_hands: usize,
    ) -> Result<Vec<HandObservation>, Box<dyn std::error::Error>> {
        let mut raw = self.session.infer(frame, NUM_KEYPOINTS, self.confidence)?;
        let kept = nms(&mut raw, NMS_IOU_THRESH);
        Ok(kept
            .iter()
            .take(max_hands)
            .map(|det| to_observation(det, frame.width() as f64, frame.height() as f64))
            .collect())
    }
}

/// Picks the fingertip joints out of a detection and normalizes them by
/// frame size. Tips the model did not emit are left out.
fn to_observation(det: &RawDetection, fw: f64, fh: f64) -> HandObservation {
    let fingertips = Fingertip::ALL
        .iter()
        .zip(FINGERTIP_INDICES)
        .filter_map(|(finger, idx)| {
            let &(x, y, conf) = det.keypoints.get(idx)?;
            Some(FingertipPoint {
                finger: *finger,
                location: Point::new(x / fw, y / fh),
                confidence: conf as f32,
            })
        })
        .collect();
    HandObservation::new(fingertips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hand_det() -> RawDetection {
        RawDetection {
            x1: 0.0,
            y1: 0.0,
            x2: 100.0,
            y2: 100.0,
            confidence: 0.9,
            keypoints: (0..NUM_KEYPOINTS)
                .map(|k| (k as f64 * 10.0, 50.0, k as f64 / 20.0))
                .collect(),
        }
    }

    #[test]
    fn test_extracts_five_fingertips_in_order() {
        let hand = to_observation(&hand_det(), 200.0, 100.0);
        assert_eq!(hand.fingertips.len(), 5);
        assert_eq!(hand.fingertips[0].finger, Fingertip::Thumb);
        assert_eq!(hand.fingertips[4].finger, Fingertip::Little);
        // Index fingertip is keypoint 8
        assert_relative_eq!(hand.fingertips[1].location.x, 80.0 / 200.0);
        assert_relative_eq!(hand.fingertips[1].location.y, 0.5);
        assert_relative_eq!(hand.fingertips[1].confidence, 0.4);
    }

    #[test]
    fn test_confidence_filter_applies_to_extracted_tips() {
        // Tip confidences are 0.2, 0.4, 0.6, 0.8, 1.0
        let hand = to_observation(&hand_det(), 200.0, 100.0);
        assert_eq!(hand.confident_tips(0.3).len(), 4);
    }

    #[test]
    fn test_truncated_keypoints_drop_missing_tips() {
        let mut det = hand_det();
        det.keypoints.truncate(13);
        let hand = to_observation(&det, 200.0, 100.0);
        assert_eq!(hand.fingertips.len(), 3);
        assert_eq!(hand.fingertips[2].finger, Fingertip::Middle);
    }

    #[test]
    fn test_no_keypoints_gives_empty_hand() {
        let mut det = hand_det();
        det.keypoints.clear();
        assert!(to_observation(&det, 200.0, 100.0).fingertips.is_empty());
    }
}
