use crate::shared::geometry::{NormalizedRect, Point};

/// One face found by the landmark model.
///
/// `mouth_contour` points are relative to `bounding_box` (`0..1` across the
/// box), the same convention landmark models use for per-face keypoints.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceObservation {
    pub bounding_box: NormalizedRect,
    pub mouth_contour: Option<Vec<Point>>,
    pub confidence: f64,
}

impl FaceObservation {
    pub fn new(bounding_box: NormalizedRect, mouth_contour: Option<Vec<Point>>) -> Self {
        Self {
            bounding_box,
            mouth_contour,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Mouth contour mapped into frame coordinates (`p * box_size + box_origin`).
    pub fn mouth_points(&self) -> Vec<Point> {
        self.mouth_contour
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| self.bounding_box.denormalize(*p))
            .collect()
    }

    /// Axis-aligned rectangle enclosing the mouth contour in frame coordinates.
    ///
    /// `None` when the model gave no contour (or an empty one) for this face.
    pub fn mouth_region(&self) -> Option<NormalizedRect> {
        NormalizedRect::bounding(self.mouth_points())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face_box() -> NormalizedRect {
        NormalizedRect::new(0.3, 0.3, 0.2, 0.1)
    }

    /// Contour whose frame-space bounds are (0.35, 0.32, 0.08, 0.03).
    fn lips() -> Vec<Point> {
        vec![
            Point::new(0.25, 0.35),
            Point::new(0.45, 0.2),
            Point::new(0.65, 0.35),
            Point::new(0.45, 0.5),
        ]
    }

    #[test]
    fn test_mouth_region_bounds_transformed_contour() {
        let face = FaceObservation::new(face_box(), Some(lips()));
        let region = face.mouth_region().unwrap();
        assert_relative_eq!(region.x, 0.35, epsilon = 1e-9);
        assert_relative_eq!(region.y, 0.32, epsilon = 1e-9);
        assert_relative_eq!(region.width, 0.08, epsilon = 1e-9);
        assert_relative_eq!(region.height, 0.03, epsilon = 1e-9);
    }

    #[test]
    fn test_mouth_points_use_box_origin_and_size() {
        let face = FaceObservation::new(face_box(), Some(vec![Point::new(0.5, 0.5)]));
        let pts = face.mouth_points();
        assert_eq!(pts.len(), 1);
        assert_relative_eq!(pts[0].x, 0.4, epsilon = 1e-12);
        assert_relative_eq!(pts[0].y, 0.35, epsilon = 1e-12);
    }

    #[test]
    fn test_no_contour_has_no_region() {
        let face = FaceObservation::new(face_box(), None);
        assert!(face.mouth_points().is_empty());
        assert!(face.mouth_region().is_none());
    }

    #[test]
    fn test_empty_contour_has_no_region() {
        let face = FaceObservation::new(face_box(), Some(Vec::new()));
        assert!(face.mouth_region().is_none());
    }

    #[test]
    fn test_with_confidence() {
        let face = FaceObservation::new(face_box(), None).with_confidence(0.42);
        assert_relative_eq!(face.confidence, 0.42);
    }
}
