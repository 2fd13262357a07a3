use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use image::RgbImage;

use crate::shared::constants::SNAPSHOT_SCALE;
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// A downscaled still of the frame that started a hand-in-mouth event.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub image: RgbImage,
    pub frame_index: usize,
    pub captured_at: Instant,
    /// Where the still was archived, if archiving is enabled.
    pub saved_to: Option<PathBuf>,
}

/// Turns an alert frame into a [`Snapshot`].
pub trait SnapshotCapturer: Send {
    fn capture(&mut self, frame: Frame) -> Result<Snapshot, Box<dyn std::error::Error>>;
}

/// Resizes frames by a fixed linear factor, optionally archiving each
/// snapshot as a JPEG.
pub struct ScaledSnapshotCapturer {
    scale: f64,
    archive: Option<SnapshotArchive>,
}

struct SnapshotArchive {
    dir: PathBuf,
    writer: Box<dyn ImageWriter>,
}

impl ScaledSnapshotCapturer {
    /// Fails unless `scale` lies in `(0, 1]`.
    pub fn new(scale: f64) -> Result<Self, Box<dyn std::error::Error>> {
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(format!("Snapshot scale must be in (0, 1], got {scale}").into());
        }
        Ok(Self {
            scale,
            archive: None,
        })
    }

    /// Also writes every snapshot into `dir`.
    pub fn with_archive(mut self, dir: impl Into<PathBuf>, writer: Box<dyn ImageWriter>) -> Self {
        self.archive = Some(SnapshotArchive {
            dir: dir.into(),
            writer,
        });
        self
    }

    /// Output dimensions for a `width` × `height` frame, never below 1×1.
    pub fn scaled_size(&self, width: u32, height: u32) -> (u32, u32) {
        let w = ((width as f64 * self.scale).round() as u32).max(1);
        let h = ((height as f64 * self.scale).round() as u32).max(1);
        (w, h)
    }
}

impl Default for ScaledSnapshotCapturer {
    fn default() -> Self {
        Self {
            scale: SNAPSHOT_SCALE,
            archive: None,
        }
    }
}

impl SnapshotCapturer for ScaledSnapshotCapturer {
    fn capture(&mut self, frame: Frame) -> Result<Snapshot, Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
        }
        let (w, h) = self.scaled_size(frame.width(), frame.height());
        let frame_index = frame.index();
        let captured_at = frame.captured_at();

        let full = RgbImage::from_raw(frame.width(), frame.height(), frame.into_data())
            .ok_or("Failed to create image from frame data")?;
        let image = image::imageops::resize(&full, w, h, image::imageops::FilterType::Triangle);

        // An unwritable archive never costs the in-memory snapshot
        let saved_to = self.archive.as_ref().and_then(|archive| {
            let path = archive.dir.join(snapshot_file_name(frame_index));
            let scaled = Frame::captured(image.as_raw().clone(), w, h, 3, frame_index, captured_at);
            match archive.writer.write(&path, &scaled, None) {
                Ok(()) => Some(path),
                Err(e) => {
                    log::warn!("Failed to archive snapshot to {}: {e}", path.display());
                    None
                }
            }
        });

        Ok(Snapshot {
            image,
            frame_index,
            captured_at,
            saved_to,
        })
    }
}

/// `snapshot-<unix millis>-<frame index>.jpg`
fn snapshot_file_name(frame_index: usize) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("snapshot-{millis}-{frame_index:06}.jpg")
}

/// Archive directory used when none is configured explicitly.
pub fn default_snapshot_dir() -> Option<PathBuf> {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("Mouthwatch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::infrastructure::image_file_writer::ImageFileWriter;
    use rstest::rstest;

    fn solid_frame(width: u32, height: u32, index: usize) -> Frame {
        Frame::new(vec![90u8; (width * height * 3) as usize], width, height, 3, index)
    }

    #[test]
    fn test_capture_halves_dimensions() {
        let mut capturer = ScaledSnapshotCapturer::default();
        let snap = capturer.capture(solid_frame(64, 48, 7)).unwrap();
        assert_eq!(snap.image.dimensions(), (32, 24));
        assert_eq!(snap.frame_index, 7);
        assert!(snap.saved_to.is_none());
        assert_eq!(snap.image.get_pixel(10, 10).0, [90, 90, 90]);
    }

    #[test]
    fn test_capture_keeps_frame_timestamp() {
        let frame = solid_frame(8, 8, 0);
        let at = frame.captured_at();
        let snap = ScaledSnapshotCapturer::default().capture(frame).unwrap();
        assert_eq!(snap.captured_at, at);
    }

    #[test]
    fn test_scaled_size_never_zero() {
        let capturer = ScaledSnapshotCapturer::new(0.5).unwrap();
        assert_eq!(capturer.scaled_size(1, 1), (1, 1));
        assert_eq!(capturer.scaled_size(1280, 720), (640, 360));
    }

    #[test]
    fn test_capture_rejects_non_rgb_frame() {
        let frame = Frame::new(vec![0u8; 16], 4, 4, 1, 0);
        assert!(ScaledSnapshotCapturer::default().capture(frame).is_err());
    }

    #[test]
    fn test_archive_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let mut capturer = ScaledSnapshotCapturer::default()
            .with_archive(dir.path(), Box::new(ImageFileWriter::new()));

        let snap = capturer.capture(solid_frame(40, 30, 3)).unwrap();
        let path = snap.saved_to.unwrap();
        assert!(path.starts_with(dir.path()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("snapshot-"));
        assert!(name.ends_with("-000003.jpg"));

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (20, 15));
    }

    #[test]
    fn test_archive_failure_still_yields_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut capturer = ScaledSnapshotCapturer::default()
            .with_archive(&blocker, Box::new(ImageFileWriter::new()));

        let snap = capturer.capture(solid_frame(16, 12, 4)).unwrap();
        assert_eq!(snap.image.dimensions(), (8, 6));
        assert_eq!(snap.frame_index, 4);
        assert!(snap.saved_to.is_none());
    }

    #[test]
    fn test_custom_scale_is_applied() {
        let mut capturer = ScaledSnapshotCapturer::new(0.25).unwrap();
        let snap = capturer.capture(solid_frame(16, 12, 0)).unwrap();
        assert_eq!(snap.image.dimensions(), (4, 3));
    }

    #[rstest]
    #[case::zero(0.0)]
    #[case::negative(-0.5)]
    #[case::above_one(1.5)]
    #[case::nan(f64::NAN)]
    fn test_invalid_scale_is_rejected(#[case] scale: f64) {
        assert!(ScaledSnapshotCapturer::new(scale).is_err());
    }
}
