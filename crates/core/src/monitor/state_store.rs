use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::monitor::detection_state::{DetectionState, PassResult};
use crate::snapshot::snapshot_capturer::Snapshot;

/// The states on either side of one commit.
#[derive(Clone, Debug)]
pub struct Transition {
    pub previous: Arc<DetectionState>,
    pub current: Arc<DetectionState>,
}

impl Transition {
    /// Hand went from outside to inside the mouth with this commit.
    pub fn is_rising_edge(&self) -> bool {
        !self.previous.hand_in_mouth() && self.current.hand_in_mouth()
    }

    pub fn is_falling_edge(&self) -> bool {
        self.previous.hand_in_mouth() && !self.current.hand_in_mouth()
    }
}

/// Single owner of the published [`DetectionState`].
///
/// Every write is a read-modify-write under one lock, so a pass commit and a
/// snapshot attachment never overwrite each other. Subscribers receive every
/// new state in commit order.
pub struct StateStore {
    current: RwLock<Arc<DetectionState>>,
    subscribers: Mutex<Vec<Sender<Arc<DetectionState>>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(DetectionState::initial())),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> Arc<DetectionState> {
        Arc::clone(&self.current.read().unwrap())
    }

    /// Channel that receives every state published from now on.
    pub fn subscribe(&self) -> Receiver<Arc<DetectionState>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Applies a pass result and publishes the new state.
    pub fn commit(&self, result: PassResult, now: Instant) -> Transition {
        let mut guard = self.current.write().unwrap();
        let previous = Arc::clone(&guard);
        let current = Arc::new(previous.after_pass(result, now));
        *guard = Arc::clone(&current);
        self.publish(&current);
        Transition { previous, current }
    }

    /// Replaces only the alert snapshot, keeping whatever pass data is current.
    pub fn attach_snapshot(&self, snapshot: Arc<Snapshot>) -> Arc<DetectionState> {
        let mut guard = self.current.write().unwrap();
        let current = Arc::new(guard.with_snapshot(snapshot));
        *guard = Arc::clone(&current);
        self.publish(&current);
        current
    }

    /// Called with the state lock held so subscribers see commit order.
    fn publish(&self, state: &Arc<DetectionState>) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(Arc::clone(state)).is_ok());
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
