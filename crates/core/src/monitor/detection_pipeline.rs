use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::hand_observation::{fingertip_sets, HandObservation};
use crate::detection::domain::landmark_detector::{FaceLandmarkDetector, HandPoseDetector};
use crate::monitor::adaptive_skip::AdaptiveSkip;
use crate::monitor::detection_state::PassResult;
use crate::monitor::pipeline_logger::PipelineLogger;
use crate::monitor::state_store::{StateStore, Transition};
use crate::shared::constants::{FINGERTIP_CONFIDENCE_THRESHOLD, MAX_TRACKED_HANDS};
use crate::shared::frame::Frame;
use crate::shared::geometry::{NormalizedRect, Point};

/// Stage-one verdict.
#[derive(Clone, Debug, PartialEq)]
pub enum FaceStage {
    NoFace,
    FaceWithoutMouth,
    Mouth(NormalizedRect),
}

/// Stage-two verdict.
#[derive(Clone, Debug, PartialEq)]
pub enum HandStage {
    NoHands,
    Hands(Vec<Vec<Point>>),
}

impl HandStage {
    fn into_sets(self) -> Vec<Vec<Point>> {
        match self {
            HandStage::NoHands => Vec::new(),
            HandStage::Hands(sets) => sets,
        }
    }
}

/// How one admitted frame was handled.
#[derive(Debug)]
pub enum PassOutcome {
    /// Dropped by the adaptive skip before any inference.
    Discarded,
    /// Both stages (or stage one alone) ran and the state was committed.
    Committed(Transition),
}

impl PassOutcome {
    pub fn is_rising_edge(&self) -> bool {
        matches!(self, PassOutcome::Committed(t) if t.is_rising_edge())
    }
}

/// Two-stage detection: faces first, hands only when a mouth was found.
pub struct DetectionPipeline {
    face_detector: Box<dyn FaceLandmarkDetector>,
    hand_detector: Box<dyn HandPoseDetector>,
    skip: AdaptiveSkip,
    store: Arc<StateStore>,
    logger: Box<dyn PipelineLogger>,
    fingertip_confidence: f32,
    max_hands: usize,
}

impl DetectionPipeline {
    pub fn new(
        face_detector: Box<dyn FaceLandmarkDetector>,
        hand_detector: Box<dyn HandPoseDetector>,
        skip: AdaptiveSkip,
        store: Arc<StateStore>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            face_detector,
            hand_detector,
            skip,
            store,
            logger,
            fingertip_confidence: FINGERTIP_CONFIDENCE_THRESHOLD,
            max_hands: MAX_TRACKED_HANDS,
        }
    }

    pub fn with_fingertip_confidence(mut self, threshold: f32) -> Self {
        self.fingertip_confidence = threshold;
        self
    }

    pub fn with_max_hands(mut self, max_hands: usize) -> Self {
        self.max_hands = max_hands;
        self
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        &*self.logger
    }

    /// Runs one pass over `frame`, treating `now` as the pass time.
    pub fn process(&mut self, frame: &Frame, now: Instant) -> PassOutcome {
        let state = self.store.current();
        if self
            .skip
            .should_discard(state.mouth_detected(), state.last_face_seen_at(), now)
        {
            log::debug!("Discarding frame {} (face recently lost)", frame.index());
            self.logger.count("discarded");
            return PassOutcome::Discarded;
        }

        let result = match self.face_stage(frame) {
            FaceStage::NoFace => PassResult::NoFace,
            FaceStage::FaceWithoutMouth => PassResult::FaceWithoutMouth,
            FaceStage::Mouth(region) => PassResult::Mouth {
                region,
                fingertip_sets: self.hand_stage(frame).into_sets(),
            },
        };

        let transition = self.store.commit(result, now);
        self.logger.count("passes");
        if transition.is_rising_edge() {
            self.logger.count("alerts");
            self.logger
                .info(&format!("Hand in mouth (frame {})", frame.index()));
        } else if transition.is_falling_edge() {
            self.logger
                .info(&format!("Hand left mouth (frame {})", frame.index()));
        }
        log::debug!(
            "Pass {}: mouth={} hands={} hand_in_mouth={}",
            transition.current.generation(),
            transition.current.mouth_detected(),
            transition.current.fingertip_sets().len(),
            transition.current.hand_in_mouth()
        );
        PassOutcome::Committed(transition)
    }

    fn face_stage(&mut self, frame: &Frame) -> FaceStage {
        let t0 = Instant::now();
        let faces: Vec<FaceObservation> = match self.face_detector.detect_faces(frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        };
        self.logger
            .timing("face", t0.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("faces", faces.len() as f64);

        match faces.first() {
            None => FaceStage::NoFace,
            Some(face) => match face.mouth_region() {
                Some(region) => FaceStage::Mouth(region),
                None => FaceStage::FaceWithoutMouth,
            },
        }
    }

    fn hand_stage(&mut self, frame: &Frame) -> HandStage {
        let t0 = Instant::now();
        let hands: Vec<HandObservation> = match self.hand_detector.detect_hands(frame, self.max_hands) {
            Ok(hands) => hands,
            Err(e) => {
                log::warn!("Hand detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        };
        self.logger
            .timing("hands", t0.elapsed().as_secs_f64() * 1000.0);

        let sets = fingertip_sets(&hands, self.fingertip_confidence, self.max_hands);
        self.logger.metric("hands", sets.len() as f64);
        if sets.is_empty() {
            HandStage::NoHands
        } else {
            HandStage::Hands(sets)
        }
    }
}
