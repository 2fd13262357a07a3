use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::proximity::fingertip_in_mouth;
use crate::shared::geometry::{NormalizedRect, Point};
use crate::snapshot::snapshot_capturer::Snapshot;

/// What one completed detection pass observed.
///
/// The variants make a mouth region without a detected mouth (or fingertips
/// without a mouth) unrepresentable.
#[derive(Clone, Debug, PartialEq)]
pub enum PassResult {
    /// No face in the frame.
    NoFace,
    /// A face, but the model gave no usable mouth contour.
    FaceWithoutMouth,
    /// A mouth plus whatever fingertips the hand stage found.
    Mouth {
        region: NormalizedRect,
        fingertip_sets: Vec<Vec<Point>>,
    },
}

/// Immutable view of the monitor's current belief about the scene.
///
/// Readers always receive a whole value behind an `Arc`; a new value is
/// built for every committed pass, so fields are never observed half-updated.
#[derive(Clone, Debug, Default)]
pub struct DetectionState {
    mouth_detected: bool,
    mouth_region: Option<NormalizedRect>,
    fingertip_sets: Vec<Vec<Point>>,
    hand_in_mouth: bool,
    last_face_seen_at: Option<Instant>,
    last_alert_snapshot: Option<Arc<Snapshot>>,
    generation: u64,
    alert_count: u64,
}

impl DetectionState {
    /// State before any pass has run.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Builds the state that follows `self` once `result` is committed at `now`.
    ///
    /// Any face refreshes `last_face_seen_at`. The alert snapshot is carried
    /// over untouched; it only changes through [`Self::with_snapshot`].
    pub fn after_pass(&self, result: PassResult, now: Instant) -> Self {
        let (mouth_region, fingertip_sets, last_face_seen_at) = match result {
            PassResult::NoFace => (None, Vec::new(), self.last_face_seen_at),
            PassResult::FaceWithoutMouth => (None, Vec::new(), Some(now)),
            PassResult::Mouth {
                region,
                fingertip_sets,
            } => (Some(region), fingertip_sets, Some(now)),
        };
        let mouth_detected = mouth_region.is_some();
        let hand_in_mouth = mouth_detected && fingertip_in_mouth(mouth_region.as_ref(), &fingertip_sets);
        let rising = hand_in_mouth && !self.hand_in_mouth;

        Self {
            mouth_detected,
            mouth_region,
            fingertip_sets,
            hand_in_mouth,
            last_face_seen_at,
            last_alert_snapshot: self.last_alert_snapshot.clone(),
            generation: self.generation + 1,
            alert_count: self.alert_count + u64::from(rising),
        }
    }

    /// Same state with the alert snapshot replaced.
    pub fn with_snapshot(&self, snapshot: Arc<Snapshot>) -> Self {
        Self {
            last_alert_snapshot: Some(snapshot),
            ..self.clone()
        }
    }

    pub fn mouth_detected(&self) -> bool {
        self.mouth_detected
    }

    pub fn mouth_region(&self) -> Option<&NormalizedRect> {
        self.mouth_region.as_ref()
    }

    pub fn fingertip_sets(&self) -> &[Vec<Point>] {
        &self.fingertip_sets
    }

    pub fn hand_in_mouth(&self) -> bool {
        self.hand_in_mouth
    }

    pub fn last_face_seen_at(&self) -> Option<Instant> {
        self.last_face_seen_at
    }

    pub fn last_alert_snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.last_alert_snapshot.as_ref()
    }

    /// Number of committed passes (discarded frames don't count).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of hand-in-mouth events started so far.
    pub fn alert_count(&self) -> u64 {
        self.alert_count
    }
}
