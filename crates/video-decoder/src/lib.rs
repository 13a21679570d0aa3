/// FFmpeg-backed video source
///
/// Opens a container with `ffmpeg-next`, decodes the best video stream with the
/// multi-threaded software decoder and converts frames to packed RGB24 at native
/// resolution. Supports sequential reads and frame-index seeks.
use action_recognition_common::{
    RecognitionError, Result, SourceOpener, VideoProperties, VideoSource,
};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::context::Input;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{Context as Scaler, Flags};
use ffmpeg::util::frame::video::Video;
use image::RgbImage;
use std::path::Path;
use tracing::{debug, info};

/// `AV_TIME_BASE` expressed as microseconds per second
const AV_TIME_BASE_US: f64 = 1_000_000.0;

/// Targets this close ahead of the decoder are reached by decoding forward instead of seeking
const FORWARD_DECODE_LIMIT: u64 = 48;

/// Initialize `FFmpeg` library
fn init_ffmpeg() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        ffmpeg::init().expect("Failed to initialize FFmpeg");
    });
}

/// Decoder state for one opened video file
pub struct FfmpegSource {
    input: Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Option<Scaler>,
    stream_index: usize,
    /// Seconds per pts tick
    time_base: f64,
    start_pts: i64,
    properties: VideoProperties,
    /// Index of the frame the decoder will produce next
    position: u64,
    eof: bool,
}

impl FfmpegSource {
    /// Open a video file and prepare its best video stream for decoding
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::SourceOpenFailure`] if:
    /// - The input file cannot be opened or probed
    /// - No video stream is found
    /// - The decoder cannot be created
    pub fn open(path: &Path) -> Result<Self> {
        init_ffmpeg();

        let input = ffmpeg::format::input(&path).map_err(|e| {
            RecognitionError::SourceOpenFailure(format!("{}: {e}", path.display()))
        })?;

        let (stream_index, time_base, start_pts, fps, declared_frames, stream_duration, decoder) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| {
                    RecognitionError::SourceOpenFailure(format!(
                        "{}: no video stream found",
                        path.display()
                    ))
                })?;

            let tb = stream.time_base();
            let time_base = rational_to_f64(tb.numerator(), tb.denominator()).unwrap_or(0.0);

            let avg = stream.avg_frame_rate();
            let real = stream.rate();
            let fps = rational_to_f64(avg.numerator(), avg.denominator())
                .filter(|f| *f > 0.0)
                .or_else(|| rational_to_f64(real.numerator(), real.denominator()))
                .filter(|f| f.is_finite() && *f > 0.0)
                .unwrap_or(0.0);

            // AV_NOPTS_VALUE
            let start_pts = match stream.start_time() {
                i64::MIN => 0,
                t => t,
            };

            let stream_duration = if stream.duration() > 0 {
                stream.duration() as f64 * time_base
            } else {
                0.0
            };

            let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| {
                    RecognitionError::SourceOpenFailure(format!("Failed to create context: {e}"))
                })?
                .decoder()
                .video()
                .map_err(|e| {
                    RecognitionError::SourceOpenFailure(format!("Failed to create decoder: {e}"))
                })?;

            (
                stream.index(),
                time_base,
                start_pts,
                fps,
                stream.frames(),
                stream_duration,
                decoder,
            )
        };

        let duration = if stream_duration > 0.0 {
            stream_duration
        } else if input.duration() > 0 {
            input.duration() as f64 / AV_TIME_BASE_US
        } else {
            0.0
        };

        let properties = VideoProperties {
            fps,
            total_frames: estimate_frame_count(declared_frames, duration, fps),
            width: decoder.width(),
            height: decoder.height(),
        };

        info!(
            "Opened {}: {}x{} @ {:.2} fps, {} frames",
            path.display(),
            properties.width,
            properties.height,
            properties.fps,
            properties.total_frames
        );

        Ok(Self {
            input,
            decoder,
            scaler: None,
            stream_index,
            time_base,
            start_pts,
            properties,
            position: 0,
            eof: false,
        })
    }

    /// Pull the next decoded frame, feeding packets as needed
    fn decode_frame(&mut self) -> Result<Option<Video>> {
        let mut frame = Video::empty();
        loop {
            if self.decoder.receive_frame(&mut frame).is_ok() {
                return Ok(Some(frame));
            }
            if self.eof {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        debug!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    self.decoder.send_eof().ok();
                    self.eof = true;
                }
            }
        }
    }

    /// Native frame index of a decoded frame, if it carries a timestamp
    fn frame_index(&self, frame: &Video) -> Option<u64> {
        let pts = frame.timestamp().or_else(|| frame.pts())?;
        Some(pts_to_frame_index(
            pts,
            self.start_pts,
            self.time_base,
            self.properties.fps,
        ))
    }

    /// Seek so that the next decoded frame is at or before `index`
    fn seek_to(&mut self, index: u64) -> bool {
        if self.properties.fps <= 0.0 {
            return false;
        }
        let ts = (index as f64 / self.properties.fps * AV_TIME_BASE_US) as i64;
        if let Err(e) = self.input.seek(ts, ..ts) {
            debug!("Seek to frame {index} failed: {e}");
            return false;
        }
        self.decoder.flush();
        self.eof = false;
        self.position = index;
        true
    }

    /// Convert a decoded frame to packed RGB24
    fn to_rgb(&mut self, frame: &Video) -> Result<RgbImage> {
        let (format, width, height) = (frame.format(), frame.width(), frame.height());

        let stale = self.scaler.as_ref().is_none_or(|s| {
            let def = s.input();
            def.format != format || def.width != width || def.height != height
        });
        if stale {
            let scaler = Scaler::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                Flags::BILINEAR,
            )
            .map_err(|e| RecognitionError::Image(format!("Failed to create scaler: {e}")))?;
            self.scaler = Some(scaler);
        }

        let mut converted = Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .run(frame, &mut converted)
                .map_err(|e| RecognitionError::Image(format!("Failed to convert frame: {e}")))?;
        }

        let data = copy_rgb_rows(&converted);
        RgbImage::from_raw(width, height, data).ok_or_else(|| {
            RecognitionError::Image(format!("RGB buffer does not fit {width}x{height}"))
        })
    }
}

impl VideoSource for FfmpegSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn read_next(&mut self) -> Result<Option<RgbImage>> {
        let Some(frame) = self.decode_frame()? else {
            return Ok(None);
        };
        self.position = self.frame_index(&frame).unwrap_or(self.position) + 1;
        self.to_rgb(&frame).map(Some)
    }

    fn read_at(&mut self, index: u64) -> Result<Option<RgbImage>> {
        let needs_seek = index < self.position || index - self.position > FORWARD_DECODE_LIMIT;
        if needs_seek && !self.seek_to(index) {
            return Ok(None);
        }

        loop {
            let Some(frame) = self.decode_frame()? else {
                return Ok(None);
            };
            let frame_index = self.frame_index(&frame);
            self.position = frame_index.map_or(self.position + 1, |i| i + 1);

            if matches!(frame_index, Some(i) if i < index) {
                continue;
            }
            return self.to_rgb(&frame).map(Some);
        }
    }
}

/// Opens files with [`FfmpegSource`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegOpener;

impl SourceOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }
}

/// Copy an RGB24 frame into a contiguous buffer, dropping row padding
fn copy_rgb_rows(frame: &Video) -> Vec<u8> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let plane_data = frame.data(0);

    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        data.extend_from_slice(&plane_data[row_start..row_start + width * 3]);
    }
    data
}

fn rational_to_f64(numerator: i32, denominator: i32) -> Option<f64> {
    (denominator != 0).then(|| f64::from(numerator) / f64::from(denominator))
}

/// Declared frame count, or `round(duration * fps)` when the container declares none
fn estimate_frame_count(declared: i64, duration_secs: f64, fps: f64) -> u64 {
    if declared > 0 {
        return declared as u64;
    }
    if duration_secs > 0.0 && fps > 0.0 {
        return (duration_secs * fps).round() as u64;
    }
    0
}

fn pts_to_frame_index(pts: i64, start_pts: i64, time_base: f64, fps: f64) -> u64 {
    let seconds = (pts - start_pts) as f64 * time_base;
    (seconds * fps).round().max(0.0) as u64
}
