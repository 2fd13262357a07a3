use std::time::Duration;

/// Stream properties reported by a frame source when it opens.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub source: String,
}

impl VideoMetadata {
    /// Time between consecutive frames, or `None` when the rate is unknown.
    pub fn frame_interval(&self) -> Option<Duration> {
        if self.fps.is_finite() && self.fps > 0.0 {
            Some(Duration::from_secs_f64(1.0 / self.fps))
        } else {
            None
        }
    }
}
