use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::monitor::admission_gate::{AdmissionGate, AdmissionTicket};
use crate::shared::constants::MIN_CHECK_INTERVAL_SECS;
use crate::shared::frame::Frame;

/// A frame travelling to the pipeline worker together with the ticket that
/// admitted it.
pub type AdmittedFrame = (Frame, AdmissionTicket);

/// Clamps a requested interval to the supported minimum.
///
/// Returns `None` for values that can't describe an interval (NaN, infinite).
pub fn clamp_interval(secs: f64) -> Option<f64> {
    secs.is_finite().then(|| secs.max(MIN_CHECK_INTERVAL_SECS))
}

/// What a sampling tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The frame source isn't delivering; nothing happened.
    SourceInactive,
    /// A pass is still in flight; this tick is lost.
    Busy,
    /// A ticket is armed for the next delivered frame.
    Armed,
}

#[derive(Default)]
struct InboxSlot {
    ticket: Option<AdmissionTicket>,
    tx: Option<Sender<AdmittedFrame>>,
}

/// Meeting point of the timer, the frame source and the pipeline worker.
struct FrameInbox {
    gate: Arc<AdmissionGate>,
    source_active: AtomicBool,
    slot: Mutex<InboxSlot>,
}

impl FrameInbox {
    fn tick(&self) -> TickOutcome {
        if !self.source_active.load(Ordering::Acquire) {
            log::debug!("Skipping tick: session not running");
            return TickOutcome::SourceInactive;
        }
        let Some(ticket) = self.gate.try_acquire() else {
            log::debug!("Skipping tick: still processing");
            return TickOutcome::Busy;
        };
        let mut slot = self.slot.lock().unwrap();
        if slot.tx.is_none() {
            // Closed; the ticket drops here and the gate reopens
            return TickOutcome::SourceInactive;
        }
        slot.ticket = Some(ticket);
        TickOutcome::Armed
    }

    fn deliver(&self, frame: Frame) -> bool {
        let mut slot = self.slot.lock().unwrap();
        let Some(ticket) = slot.ticket.take() else {
            return false;
        };
        let Some(tx) = slot.tx.as_ref() else {
            return false;
        };
        match tx.try_send((frame, ticket)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                log::warn!("Pipeline worker unavailable, dropping admitted frame");
                false
            }
        }
    }

    fn disarm(&self) {
        self.slot.lock().unwrap().ticket = None;
    }

    fn close(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.ticket = None;
        slot.tx = None;
    }
}

/// Handle through which a frame source feeds the monitor.
///
/// Cheap to clone. Frames delivered while no sampling tick is pending are
/// dropped immediately, so a source may deliver at its native rate.
#[derive(Clone)]
pub struct FrameSink {
    inbox: Arc<FrameInbox>,
}

impl FrameSink {
    /// Hands a frame over. Returns `true` if it was admitted for a pass.
    pub fn deliver(&self, frame: Frame) -> bool {
        self.inbox.deliver(frame)
    }

    /// Reports whether the source is currently producing frames.
    ///
    /// Going inactive also cancels an armed tick whose frame would never come.
    pub fn set_active(&self, active: bool) {
        self.inbox.source_active.store(active, Ordering::Release);
        if !active {
            self.inbox.disarm();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inbox.source_active.load(Ordering::Acquire)
    }
}

enum TimerCommand {
    SetInterval(Duration),
    Shutdown,
}

/// Periodic sampling timer.
///
/// Each tick tries to take the admission gate and, if it gets it, arms the
/// frame sink so the next delivered frame is sent to the pipeline worker.
pub struct SamplingController {
    inbox: Arc<FrameInbox>,
    commands: Sender<TimerCommand>,
    interval_secs: Mutex<f64>,
    handle: Option<JoinHandle<()>>,
}

impl SamplingController {
    /// Starts the timer thread. Admitted frames are sent on `frames`.
    pub fn start(
        gate: Arc<AdmissionGate>,
        frames: Sender<AdmittedFrame>,
        interval_secs: f64,
    ) -> std::io::Result<Self> {
        let interval_secs = clamp_interval(interval_secs).unwrap_or(MIN_CHECK_INTERVAL_SECS);
        let inbox = Arc::new(FrameInbox {
            gate,
            source_active: AtomicBool::new(false),
            slot: Mutex::new(InboxSlot {
                ticket: None,
                tx: Some(frames),
            }),
        });
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let handle = spawn_timer(
            Arc::clone(&inbox),
            Duration::from_secs_f64(interval_secs),
            command_rx,
        )?;

        Ok(Self {
            inbox,
            commands,
            interval_secs: Mutex::new(interval_secs),
            handle: Some(handle),
        })
    }

    pub fn frame_sink(&self) -> FrameSink {
        FrameSink {
            inbox: Arc::clone(&self.inbox),
        }
    }

    pub fn interval(&self) -> f64 {
        *self.interval_secs.lock().unwrap()
    }

    /// Reschedules the timer and returns the interval actually in effect.
    ///
    /// A pass already in flight is unaffected.
    pub fn set_interval(&self, secs: f64) -> f64 {
        let Some(secs) = clamp_interval(secs) else {
            log::warn!("Ignoring invalid check interval {secs}");
            return self.interval();
        };
        *self.interval_secs.lock().unwrap() = secs;
        let _ = self
            .commands
            .send(TimerCommand::SetInterval(Duration::from_secs_f64(secs)));
        secs
    }

    /// Stops the timer, cancels any armed tick and disconnects the sink from
    /// the pipeline worker. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(TimerCommand::Shutdown);
            if handle.join().is_err() {
                log::warn!("Sampling timer thread panicked");
            }
        }
        self.inbox.close();
    }
}

impl Drop for SamplingController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_timer(
    inbox: Arc<FrameInbox>,
    interval: Duration,
    commands: Receiver<TimerCommand>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("monitor-timer".into())
        .spawn(move || {
            let mut ticker = crossbeam_channel::tick(interval);
            loop {
                let command = crossbeam_channel::select! {
                    recv(ticker) -> _ => {
                        inbox.tick();
                        continue;
                    }
                    recv(commands) -> command => command,
                };
                match command {
                    Ok(TimerCommand::SetInterval(interval)) => {
                        log::debug!("Check interval set to {:.2}s", interval.as_secs_f64());
                        ticker = crossbeam_channel::tick(interval);
                    }
                    Ok(TimerCommand::Shutdown) | Err(_) => break,
                }
            }
        })
}
