#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mouthwatch_core::detection::domain::face_observation::FaceObservation;
use mouthwatch_core::detection::domain::hand_observation::{
    Fingertip, FingertipPoint, HandObservation,
};
use mouthwatch_core::detection::domain::landmark_detector::{
    FaceLandmarkDetector, HandPoseDetector,
};
use mouthwatch_core::shared::frame::Frame;
use mouthwatch_core::shared::geometry::{NormalizedRect, Point};
use mouthwatch_core::snapshot::snapshot_capturer::{
    ScaledSnapshotCapturer, Snapshot, SnapshotCapturer,
};

/// Face box whose lip contour bounds to `(0.35, 0.32, 0.08, 0.03)`.
pub fn face_with_mouth() -> FaceObservation {
    FaceObservation::new(
        NormalizedRect::new(0.3, 0.3, 0.2, 0.1),
        Some(vec![
            Point::new(0.25, 0.35),
            Point::new(0.45, 0.2),
            Point::new(0.65, 0.35),
            Point::new(0.45, 0.5),
        ]),
    )
}

pub fn face_without_mouth() -> FaceObservation {
    FaceObservation::new(NormalizedRect::new(0.3, 0.3, 0.2, 0.1), None)
}

pub fn hand_with_tip(x: f64, y: f64) -> HandObservation {
    HandObservation::new(vec![FingertipPoint {
        finger: Fingertip::Index,
        location: Point::new(x, y),
        confidence: 0.9,
    }])
}

pub fn tip_inside_mouth() -> HandObservation {
    hand_with_tip(0.37, 0.33)
}

pub fn tip_far_away() -> HandObservation {
    hand_with_tip(0.1, 0.1)
}

pub fn test_frame(index: usize) -> Frame {
    Frame::new(vec![120u8; 16 * 12 * 3], 16, 12, 3, index)
}

/// Call bookkeeping shared between a fake and the test body.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl CallLog {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> usize {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst)
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Replays a script of results, one entry per call; the last entry repeats.
pub struct Scripted<T> {
    script: Vec<T>,
    delay: Duration,
    log: CallLog,
}

impl<T: Clone> Scripted<T> {
    pub fn new(script: Vec<T>) -> Self {
        assert!(!script.is_empty());
        Self {
            script,
            delay: Duration::ZERO,
            log: CallLog::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn next(&mut self) -> T {
        let call = self.log.enter();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let value = self.script[call.min(self.script.len() - 1)].clone();
        self.log.exit();
        value
    }
}

impl FaceLandmarkDetector for Scripted<Vec<FaceObservation>> {
    fn detect_faces(
        &mut self,
        _frame: &Frame,
    ) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>> {
        Ok(self.next())
    }
}

impl HandPoseDetector for Scripted<Vec<HandObservation>> {
    fn detect_hands(
        &mut self,
        _frame: &Frame,
        max_hands: usize,
    ) -> Result<Vec<HandObservation>, Box<dyn std::error::Error>> {
        let mut hands = self.next();
        hands.truncate(max_hands);
        Ok(hands)
    }
}

/// Real capturer that also records which frames it was given.
pub struct RecordingCapturer {
    inner: ScaledSnapshotCapturer,
    captured: Arc<Mutex<Vec<usize>>>,
}

impl RecordingCapturer {
    pub fn new() -> (Self, Arc<Mutex<Vec<usize>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner: ScaledSnapshotCapturer::default(),
                captured: Arc::clone(&captured),
            },
            captured,
        )
    }
}

impl SnapshotCapturer for RecordingCapturer {
    fn capture(&mut self, frame: Frame) -> Result<Snapshot, Box<dyn std::error::Error>> {
        self.captured.lock().unwrap().push(frame.index());
        self.inner.capture(frame)
    }
}
