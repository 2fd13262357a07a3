use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::monitor::sampling_controller::FrameSink;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Decodes any ffmpeg-readable input (file or capture device) and pushes
/// RGB frames into a [`FrameSink`] from a dedicated thread.
///
/// With `realtime` enabled, delivery is paced to the stream's frame rate so
/// a recorded file behaves like a live camera.
pub struct FfmpegFrameSource {
    input: PathBuf,
    metadata: VideoMetadata,
    realtime: bool,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FfmpegFrameSource {
    /// Probes `input` and prepares a source for it. Nothing is decoded yet.
    pub fn open(input: &Path, realtime: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let metadata = Decoder::open(input)?.metadata;
        log::info!(
            "Opened {} ({}x{} @ {:.2} fps, {})",
            metadata.source,
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.codec
        );
        Ok(Self {
            input: input.to_path_buf(),
            metadata,
            realtime,
            stop: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Blocks until the source reaches the end of its input or is stopped.
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Frame source thread panicked");
            }
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn start(&mut self, sink: FrameSink) -> Result<(), Box<dyn std::error::Error>> {
        if self.handle.is_some() {
            return Err("frame source already started".into());
        }
        self.stop.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);

        let input = self.input.clone();
        let pacing = if self.realtime {
            self.metadata.frame_interval()
        } else {
            None
        };
        let stop = Arc::clone(&self.stop);
        let running = Arc::clone(&self.running);

        let spawned = std::thread::Builder::new()
            .name("frame-source".into())
            .spawn(move || {
                sink.set_active(true);
                match run_decode_loop(&input, &sink, pacing, &stop) {
                    Ok(delivered) => log::info!("Frame source finished after {delivered} frames"),
                    Err(e) => log::warn!("Frame source stopped: {e}"),
                }
                sink.set_active(false);
                running.store(false, Ordering::Release);
            });
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(Box::new(e))
            }
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.wait();
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decodes `input` until end of stream or `stop`, returning how many frames
/// were decoded.
fn run_decode_loop(
    input: &Path,
    sink: &FrameSink,
    pacing: Option<Duration>,
    stop: &AtomicBool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut decoder = Decoder::open(input)?;
    let started = Instant::now();
    let mut count = 0usize;

    while !stop.load(Ordering::Acquire) {
        let Some(frame) = decoder.next_frame()? else {
            break;
        };
        if let Some(interval) = pacing {
            let due = started + interval.mul_f64(count as f64);
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        sink.deliver(frame);
        count += 1;
    }
    Ok(count)
}

/// Owns the demuxer, decoder and RGB scaler for one input.
struct Decoder {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    metadata: VideoMetadata,
    stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl Decoder {
    fn open(input: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(&input)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source: input.display().to_string(),
        };

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            metadata,
            stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if self.done {
            return Ok(None);
        }
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let next = self
                .ictx
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            let Some((index, packet)) = next else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(Some(frame));
                }
                self.done = true;
                return Ok(None);
            };

            if index != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;

        let (w, h) = (self.metadata.width, self.metadata.height);
        let frame = Frame::new(extract_rgb_pixels(&rgb, w, h), w, h, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::admission_gate::AdmissionGate;
    use crate::monitor::sampling_controller::SamplingController;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(&path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let write_packets = |encoder: &mut ffmpeg_next::encoder::Video,
                                 octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let value = ((i * 40) % 256) as u8;
            rgb.data_mut(0).fill(value);

            let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            write_packets(&mut encoder, &mut octx);
        }
        encoder.send_eof().unwrap();
        write_packets(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    #[test]
    fn test_open_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 5, 160, 120, 30);

        let source = FfmpegFrameSource::open(&path, false).unwrap();
        assert_eq!(source.metadata().width, 160);
        assert_eq!(source.metadata().height, 120);
        assert!(source.metadata().fps > 0.0);
        assert!(!source.is_running());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        assert!(FfmpegFrameSource::open(Path::new("/nonexistent/clip.mp4"), false).is_err());
    }

    #[test]
    fn test_decoder_yields_every_frame_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 5, 160, 120, 30);

        let mut decoder = Decoder::open(&path).unwrap();
        let mut indices = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
            indices.push(frame.index());
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_realtime_playback_feeds_sink_then_goes_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        create_test_video(&path, 15, 64, 48, 30);

        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut controller = SamplingController::start(AdmissionGate::new(), tx, 0.1).unwrap();
        let sink = controller.frame_sink();

        let mut source = FfmpegFrameSource::open(&path, true).unwrap();
        source.start(sink.clone()).unwrap();
        assert!(source.is_running());
        assert!(source.start(sink.clone()).is_err());
        source.wait();

        assert!(!source.is_running());
        assert!(!sink.is_active());
        // 15 frames at 30 fps span 0.5 s, several 0.1 s ticks
        assert!(rx.try_recv().is_ok());
        controller.stop();
    }
}
