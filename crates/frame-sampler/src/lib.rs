//! Frame sampler
//!
//! Turns a video of arbitrary length into a fixed-length, fixed-resolution
//! [`FrameBatch`] for the classifier.
//!
//! # Sampling policy
//! - **Uniform sampling** (`T >= N`): `N` indices spread evenly over `[0, T-1]`,
//!   `index_i = floor(i * (T-1) / (N-1))`, decoded in increasing order. A frame that
//!   cannot be decoded is replaced by the previously collected frame.
//! - **Short videos** (`T < N`): every frame is decoded in order, then the last decoded
//!   frame is repeated until the batch holds `N` frames.
//!
//! Both substitutions are counted in [`FrameBatch::padded_frames`].
//!
//! # Example
//! ```no_run
//! use action_recognition_sampler::FrameSampler;
//! use action_recognition_common::VideoSource;
//!
//! # fn run(source: &mut dyn VideoSource) -> action_recognition_common::Result<()> {
//! let sampler = FrameSampler::new(16, (112, 112));
//! let batch = sampler.extract(source)?;
//! assert_eq!(batch.len(), 16);
//! # Ok(())
//! # }
//! ```

use action_recognition_common::{
    FrameBatch, RecognitionError, Result, Settings, VideoMetadata, VideoSource,
};
use image::imageops::FilterType;
use image::RgbImage;
use tracing::{debug, info, warn};

/// Frame sampler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSampler {
    /// Frames per batch (N)
    pub num_frames: usize,
    /// Output resolution as `(width, height)`
    pub target_size: (u32, u32),
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self {
            num_frames: 16,
            target_size: (112, 112),
        }
    }
}

impl FrameSampler {
    #[must_use]
    pub fn new(num_frames: usize, target_size: (u32, u32)) -> Self {
        Self {
            num_frames,
            target_size,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.num_frames,
            (settings.frame_width, settings.frame_height),
        )
    }

    /// Extract a batch using this sampler's frame count and resolution
    ///
    /// # Errors
    ///
    /// See [`extract_frames`].
    pub fn extract(&self, source: &mut dyn VideoSource) -> Result<FrameBatch> {
        extract_frames(source, self.num_frames, self.target_size)
    }

    /// Metadata of an opened source
    #[must_use]
    pub fn describe(&self, source: &dyn VideoSource) -> VideoMetadata {
        describe(source)
    }
}

/// Metadata of an opened source
///
/// Unknown auxiliary fields are reported as 0 rather than failing.
#[must_use]
pub fn describe(source: &dyn VideoSource) -> VideoMetadata {
    VideoMetadata::from_properties(&source.properties())
}

/// Target frame indices for uniform sampling
///
/// Returns `floor(i * (T-1) / (N-1))` for `i in 0..N`; a single frame maps to index 0.
#[must_use]
pub fn sample_indices(total_frames: u64, num_frames: usize) -> Vec<u64> {
    match num_frames {
        0 => Vec::new(),
        1 => vec![0],
        n => {
            let last = total_frames.saturating_sub(1);
            let steps = (n - 1) as u64;
            (0..n as u64).map(|i| i * last / steps).collect()
        }
    }
}

/// Extract exactly `num_frames` RGB frames at `target_size` from a source
///
/// # Errors
///
/// Returns an error if:
/// - The source reports 0 frames, or no frame can be decoded ([`RecognitionError::EmptySource`])
/// - The produced sequence does not hold `num_frames` frames
///   ([`RecognitionError::ExtractionIncomplete`]); this happens only when the first sampled
///   frame cannot be decoded
pub fn extract_frames(
    source: &mut dyn VideoSource,
    num_frames: usize,
    target_size: (u32, u32),
) -> Result<FrameBatch> {
    if num_frames == 0 {
        return Err(RecognitionError::Unexpected(
            "frame count must be at least 1".to_string(),
        ));
    }

    let total_frames = source.properties().total_frames;
    if total_frames == 0 {
        return Err(RecognitionError::EmptySource);
    }

    let (frames, padded) = if total_frames < num_frames as u64 {
        debug!("Short video ({total_frames} < {num_frames} frames), reading all and padding");
        read_all_and_pad(source, num_frames, target_size)?
    } else {
        sample_uniform(source, total_frames, num_frames, target_size)
    };

    if padded > 0 {
        info!("Frame batch uses {padded}/{num_frames} repeated frames");
    }

    FrameBatch::new(frames, num_frames, target_size, padded)
}

/// Decode every frame in order, then repeat the last one up to `num_frames`
fn read_all_and_pad(
    source: &mut dyn VideoSource,
    num_frames: usize,
    target_size: (u32, u32),
) -> Result<(Vec<RgbImage>, usize)> {
    let mut frames = Vec::with_capacity(num_frames);

    while frames.len() < num_frames {
        match source.read_next() {
            Ok(Some(frame)) => frames.push(fit(&frame, target_size)),
            Ok(None) => break,
            Err(e) => {
                warn!(
                    "Decode failed after {} frames, treating as end of stream: {e}",
                    frames.len()
                );
                break;
            }
        }
    }

    if frames.len() == num_frames && matches!(source.read_next(), Ok(Some(_))) {
        warn!(
            "Source declares {} frames but decodes more; keeping the first {num_frames}",
            source.properties().total_frames
        );
    }

    let Some(last) = frames.last().cloned() else {
        return Err(RecognitionError::EmptySource);
    };

    let decoded = frames.len();
    frames.resize(num_frames, last);
    Ok((frames, num_frames - decoded))
}

/// Decode frames at evenly spaced indices with carry-forward on failure
fn sample_uniform(
    source: &mut dyn VideoSource,
    total_frames: u64,
    num_frames: usize,
    target_size: (u32, u32),
) -> (Vec<RgbImage>, usize) {
    let mut frames: Vec<RgbImage> = Vec::with_capacity(num_frames);
    let mut carried = 0;

    for index in sample_indices(total_frames, num_frames) {
        let decoded = source.read_at(index).unwrap_or_else(|e| {
            warn!("Decode of frame {index} failed: {e}");
            None
        });

        if let Some(frame) = decoded {
            frames.push(fit(&frame, target_size));
        } else if let Some(previous) = frames.last().cloned() {
            warn!("Frame {index} unavailable, carrying forward previous frame");
            frames.push(previous);
            carried += 1;
        } else {
            warn!("Frame {index} unavailable with no earlier frame to reuse");
        }
    }

    (frames, carried)
}

/// Resize to `(width, height)` with bilinear filtering
fn fit(frame: &RgbImage, (width, height): (u32, u32)) -> RgbImage {
    if frame.dimensions() == (width, height) {
        return frame.clone();
    }
    image::imageops::resize(frame, width, height, FilterType::Triangle)
}
