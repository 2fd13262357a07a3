use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Allows at most one detection pass in flight.
///
/// The gate is held from the moment a sampling tick admits a frame until the
/// pass that consumed it is over. Holding is represented by an
/// [`AdmissionTicket`]; dropping the ticket reopens the gate, so every exit
/// path of a pass (discard, error, success, unwinding) releases it.
#[derive(Debug, Default)]
pub struct AdmissionGate {
    held: AtomicBool,
}

impl AdmissionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the gate if it is open. Returns `None` while a pass is in flight.
    pub fn try_acquire(self: &Arc<Self>) -> Option<AdmissionTicket> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AdmissionTicket {
                gate: Arc::clone(self),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the admission gate.
#[derive(Debug)]
pub struct AdmissionTicket {
    gate: Arc<AdmissionGate>,
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.gate.held.store(false, Ordering::Release);
    }
}
