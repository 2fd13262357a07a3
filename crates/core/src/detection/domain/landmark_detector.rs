use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::hand_observation::HandObservation;
use crate::shared::frame::Frame;

/// Stage-one inference: faces and their mouth contours.
///
/// Implementations may hold model sessions or other per-call scratch state,
/// hence `&mut self`. Results are ordered most confident first.
pub trait FaceLandmarkDetector: Send {
    fn detect_faces(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>>;
}

/// Stage-two inference: hand poses, at most `max_hands` of them.
pub trait HandPoseDetector: Send {
    fn detect_hands(
        &mut self,
        frame: &Frame,
        max_hands: usize,
    ) -> Result<Vec<HandObservation>, Box<dyn std::error::Error>>;
}
