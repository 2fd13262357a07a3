use crate::monitor::sampling_controller::FrameSink;

/// A live feed of frames pushed into a [`FrameSink`].
///
/// The source owns its delivery thread. It reports itself active on the sink
/// while frames are flowing and inactive once it stops, for whatever reason.
pub trait FrameSource: Send {
    /// Begins delivering frames to `sink`.
    fn start(&mut self, sink: FrameSink) -> Result<(), Box<dyn std::error::Error>>;

    /// Stops delivery and waits for the delivery thread. Idempotent.
    fn stop(&mut self);

    /// True while frames are being delivered.
    fn is_running(&self) -> bool;
}
