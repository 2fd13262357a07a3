use std::path::Path;

use crate::shared::frame::Frame;

/// Persists a single frame as a still image.
pub trait ImageWriter: Send {
    /// Writes `frame` to `path`, resized to `size` when given. The format
    /// follows the path's extension.
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
