use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::detection::domain::landmark_detector::{FaceLandmarkDetector, HandPoseDetector};
use crate::monitor::adaptive_skip::{AdaptiveSkip, LcgSampler, Sampler};
use crate::monitor::admission_gate::AdmissionGate;
use crate::monitor::detection_pipeline::DetectionPipeline;
use crate::monitor::detection_state::DetectionState;
use crate::monitor::pipeline_logger::PipelineLogger;
use crate::monitor::sampling_controller::{AdmittedFrame, FrameSink, SamplingController};
use crate::monitor::state_store::StateStore;
use crate::shared::constants::{
    DEFAULT_CHECK_INTERVAL_SECS, FACE_DETECTION_TIMEOUT, FINGERTIP_CONFIDENCE_THRESHOLD,
    MAX_TRACKED_HANDS, THROTTLED_KEEP_ONE_IN,
};
use crate::snapshot::snapshot_capturer::SnapshotCapturer;
use crate::snapshot::snapshot_worker::{SnapshotRequester, SnapshotWorker};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("invalid monitor configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Tunables for a [`MouthMonitor`].
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    /// Seconds between sampling ticks.
    pub check_interval: f64,
    /// How long after the last face the sampler keeps throttling.
    pub face_timeout: Duration,
    /// While throttled, one admitted frame in this many is processed.
    pub keep_one_in: u32,
    pub fingertip_confidence: f32,
    pub max_hands: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            face_timeout: FACE_DETECTION_TIMEOUT,
            keep_one_in: THROTTLED_KEEP_ONE_IN,
            fingertip_confidence: FINGERTIP_CONFIDENCE_THRESHOLD,
            max_hands: MAX_TRACKED_HANDS,
        }
    }
}

impl MonitorConfig {
    /// Rejects values with no sensible meaning. A check interval below the
    /// 0.1 s floor is not an error; the timer clamps it.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if !self.check_interval.is_finite() {
            return Err(MonitorError::InvalidConfig(format!(
                "check interval must be a finite number of seconds, got {}",
                self.check_interval
            )));
        }
        if self.keep_one_in == 0 {
            return Err(MonitorError::InvalidConfig(
                "keep_one_in must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.fingertip_confidence) {
            return Err(MonitorError::InvalidConfig(format!(
                "fingertip confidence must be in [0, 1), got {}",
                self.fingertip_confidence
            )));
        }
        if self.max_hands == 0 {
            return Err(MonitorError::InvalidConfig(
                "max_hands must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Watches a frame feed for fingertips entering the mouth.
///
/// Owns three threads: the sampling timer, the pipeline worker running
/// inference, and the snapshot worker. Frames come in through
/// [`Self::frame_sink`]; results go out through [`Self::state`] and
/// [`Self::subscribe`]. Dropping the monitor shuts everything down.
pub struct MouthMonitor {
    store: Arc<StateStore>,
    sampler: SamplingController,
    pipeline: Option<JoinHandle<DetectionPipeline>>,
    snapshots: SnapshotWorker,
    cleaned_up: bool,
}

impl MouthMonitor {
    pub fn start(
        config: MonitorConfig,
        face_detector: Box<dyn FaceLandmarkDetector>,
        hand_detector: Box<dyn HandPoseDetector>,
        capturer: Box<dyn SnapshotCapturer>,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, MonitorError> {
        Self::start_with_sampler(
            config,
            face_detector,
            hand_detector,
            capturer,
            logger,
            Box::new(LcgSampler::from_clock()),
        )
    }

    /// Like [`Self::start`] with an explicit randomness source for the skip
    /// heuristic.
    pub fn start_with_sampler(
        config: MonitorConfig,
        face_detector: Box<dyn FaceLandmarkDetector>,
        hand_detector: Box<dyn HandPoseDetector>,
        capturer: Box<dyn SnapshotCapturer>,
        logger: Box<dyn PipelineLogger>,
        sampler: Box<dyn Sampler>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;

        let store = Arc::new(StateStore::new());
        let (snapshots, requester) = SnapshotWorker::start(capturer, Arc::clone(&store))
            .map_err(|e| MonitorError::Spawn {
                name: "snapshot",
                source: e,
            })?;

        let pipeline = DetectionPipeline::new(
            face_detector,
            hand_detector,
            AdaptiveSkip::new(config.face_timeout, config.keep_one_in, sampler),
            Arc::clone(&store),
            logger,
        )
        .with_fingertip_confidence(config.fingertip_confidence)
        .with_max_hands(config.max_hands);

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<AdmittedFrame>(1);
        let pipeline = spawn_pipeline(pipeline, frame_rx, requester).map_err(|e| {
            MonitorError::Spawn {
                name: "pipeline",
                source: e,
            }
        })?;

        let sampler = SamplingController::start(AdmissionGate::new(), frame_tx, config.check_interval)
            .map_err(|e| MonitorError::Spawn {
                name: "timer",
                source: e,
            })?;

        log::info!(
            "Mouth monitor started (check every {:.2}s)",
            sampler.interval()
        );

        Ok(Self {
            store,
            sampler,
            pipeline: Some(pipeline),
            snapshots,
            cleaned_up: false,
        })
    }

    /// The most recently published state.
    pub fn state(&self) -> Arc<DetectionState> {
        self.store.current()
    }

    /// Receives every state published from now on.
    pub fn subscribe(&self) -> Receiver<Arc<DetectionState>> {
        self.store.subscribe()
    }

    pub fn frame_sink(&self) -> FrameSink {
        self.sampler.frame_sink()
    }

    pub fn check_interval(&self) -> f64 {
        self.sampler.interval()
    }

    /// Changes the sampling interval (clamped to 0.1 s); returns the value in
    /// effect. An in-flight pass keeps running.
    pub fn set_check_interval(&self, secs: f64) -> f64 {
        self.sampler.set_interval(secs)
    }

    /// Stops sampling, waits for the current pass and any queued snapshots,
    /// then logs the run summary. Safe to call more than once.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        self.sampler.stop();
        if let Some(handle) = self.pipeline.take() {
            match handle.join() {
                Ok(pipeline) => {
                    // Dropping the pipeline here releases the inference sessions
                    pipeline.logger().summary();
                }
                Err(_) => log::warn!("Pipeline worker thread panicked"),
            }
        }
        self.snapshots.shutdown();
        log::info!(
            "Mouth monitor stopped after {} passes, {} alerts",
            self.store.current().generation(),
            self.store.current().alert_count()
        );
    }
}

impl Drop for MouthMonitor {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn spawn_pipeline(
    mut pipeline: DetectionPipeline,
    frames: Receiver<AdmittedFrame>,
    snapshots: SnapshotRequester,
) -> std::io::Result<JoinHandle<DetectionPipeline>> {
    std::thread::Builder::new()
        .name("monitor-pipeline".into())
        .spawn(move || {
            for (frame, ticket) in frames {
                let outcome = pipeline.process(&frame, Instant::now());
                if outcome.is_rising_edge() && !snapshots.request(frame) {
                    log::warn!("Snapshot worker gone, alert frame dropped");
                }
                // The next tick may only be admitted once this pass is committed
                drop(ticket);
            }
            pipeline
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_carries_policy_values() {
        let config = MonitorConfig::default();
        assert_eq!(config.check_interval, 2.0);
        assert_eq!(config.face_timeout, Duration::from_secs(10));
        assert_eq!(config.keep_one_in, 4);
        assert_eq!(config.fingertip_confidence, 0.3);
        assert_eq!(config.max_hands, 1);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::interval_nan(MonitorConfig { check_interval: f64::NAN, ..Default::default() })]
    #[case::interval_infinite(MonitorConfig { check_interval: f64::INFINITY, ..Default::default() })]
    #[case::keep_none(MonitorConfig { keep_one_in: 0, ..Default::default() })]
    #[case::confidence_one(MonitorConfig { fingertip_confidence: 1.0, ..Default::default() })]
    #[case::no_hands(MonitorConfig { max_hands: 0, ..Default::default() })]
    fn test_validate_rejects(#[case] config: MonitorConfig) {
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));
    }

    #[rstest]
    #[case::below_floor(0.05)]
    #[case::zero(0.0)]
    #[case::negative(-1.0)]
    fn test_short_interval_is_accepted_for_clamping(#[case] check_interval: f64) {
        let config = MonitorConfig {
            check_interval,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
