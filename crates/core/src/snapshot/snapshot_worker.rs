use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::monitor::state_store::StateStore;
use crate::shared::frame::Frame;
use crate::snapshot::snapshot_capturer::SnapshotCapturer;

/// Background thread that turns alert frames into snapshots.
///
/// Requests never block the detection pipeline. A capture failure is logged
/// and the previously published snapshot stays in place.
pub struct SnapshotWorker {
    handle: Option<JoinHandle<()>>,
}

/// Cloneable handle for queueing alert frames.
#[derive(Clone)]
pub struct SnapshotRequester {
    tx: Sender<Frame>,
}

impl SnapshotRequester {
    /// Queues `frame` for capture. Returns `false` if the worker is gone.
    pub fn request(&self, frame: Frame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

impl SnapshotWorker {
    /// Spawns the worker. It runs until every requester is dropped.
    pub fn start(
        capturer: Box<dyn SnapshotCapturer>,
        store: Arc<StateStore>,
    ) -> std::io::Result<(Self, SnapshotRequester)> {
        let (tx, rx) = crossbeam_channel::unbounded::<Frame>();
        let handle = std::thread::Builder::new()
            .name("monitor-snapshot".into())
            .spawn(move || {
                let mut capturer = capturer;
                for frame in rx {
                    let index = frame.index();
                    match capturer.capture(frame) {
                        Ok(snapshot) => {
                            match &snapshot.saved_to {
                                Some(path) => log::debug!(
                                    "Snapshot of frame {index} saved to {}",
                                    path.display()
                                ),
                                None => log::debug!("Snapshot of frame {index} captured"),
                            }
                            store.attach_snapshot(Arc::new(snapshot));
                        }
                        Err(e) => log::warn!("Snapshot of frame {index} failed: {e}"),
                    }
                }
            })?;

        Ok((
            Self {
                handle: Some(handle),
            },
            SnapshotRequester { tx },
        ))
    }

    /// Finishes outstanding captures and joins the thread. Idempotent.
    ///
    /// Blocks until every [`SnapshotRequester`] has been dropped.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Snapshot worker thread panicked");
            }
        }
    }
}

impl Drop for SnapshotWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
