use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::shared::constants::{FACE_DETECTION_TIMEOUT, THROTTLED_KEEP_ONE_IN};

/// Source of uniform random integers for the skip heuristic.
pub trait Sampler: Send {
    /// Returns a value uniformly drawn from `0..n`. `n` is at least 1.
    fn next_below(&mut self, n: u32) -> u32;
}

/// Simple 64-bit LCG. Plenty for a coin flip every few seconds.
pub struct LcgSampler {
    state: u64,
}

impl LcgSampler {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seeds from the wall clock.
    pub fn from_clock() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x853c_49e6_748f_ea9b);
        Self::new(seed)
    }
}

impl Sampler for LcgSampler {
    fn next_below(&mut self, n: u32) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // High bits of an LCG are the well-mixed ones
        let bits = (self.state >> 33) as u32;
        bits % n.max(1)
    }
}

/// Thins out detection passes right after a face disappears.
///
/// While no mouth is detected but a face was seen less than `timeout` ago,
/// only one admitted frame in `keep_one_in` goes through inference; the rest
/// are discarded before any model runs.
pub struct AdaptiveSkip {
    timeout: Duration,
    keep_one_in: u32,
    sampler: Box<dyn Sampler>,
}

impl AdaptiveSkip {
    pub fn new(timeout: Duration, keep_one_in: u32, sampler: Box<dyn Sampler>) -> Self {
        Self {
            timeout,
            keep_one_in: keep_one_in.max(1),
            sampler,
        }
    }

    /// True when the frame should be dropped without running inference.
    ///
    /// `last_face_seen_at == None` means no face was ever seen, which is
    /// outside any throttle window.
    pub fn should_discard(
        &mut self,
        mouth_detected: bool,
        last_face_seen_at: Option<Instant>,
        now: Instant,
    ) -> bool {
        if !self.is_throttling(mouth_detected, last_face_seen_at, now) {
            return false;
        }
        self.sampler.next_below(self.keep_one_in) != 0
    }

    pub fn is_throttling(
        &self,
        mouth_detected: bool,
        last_face_seen_at: Option<Instant>,
        now: Instant,
    ) -> bool {
        if mouth_detected {
            return false;
        }
        match last_face_seen_at {
            Some(seen) => now.saturating_duration_since(seen) < self.timeout,
            None => false,
        }
    }
}

impl Default for AdaptiveSkip {
    fn default() -> Self {
        Self::new(
            FACE_DETECTION_TIMEOUT,
            THROTTLED_KEEP_ONE_IN,
            Box::new(LcgSampler::from_clock()),
        )
    }
}
