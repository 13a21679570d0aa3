//! Video source abstraction and the fixed-size frame batch fed to the classifier

use crate::{RecognitionError, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Native properties reported by a video container
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoProperties {
    /// Native frame rate (0.0 when unknown)
    pub fps: f64,
    /// Native total frame count (declared or estimated)
    pub total_frames: u64,
    /// Native frame width in pixels
    pub width: u32,
    /// Native frame height in pixels
    pub height: u32,
}

/// A decodable video
///
/// Frames are returned as RGB images at native resolution. Implementations are free to
/// decode lazily; a source is owned by a single pipeline invocation and is never shared.
pub trait VideoSource {
    /// Properties known after opening
    fn properties(&self) -> VideoProperties;

    /// Decode the next frame in presentation order
    ///
    /// `Ok(None)` signals end of stream.
    fn read_next(&mut self) -> Result<Option<RgbImage>>;

    /// Seek to the 0-based native frame `index` and decode it
    ///
    /// `Ok(None)` means the frame could not be reached (past end of stream, seek failure).
    fn read_at(&mut self, index: u64) -> Result<Option<RgbImage>>;
}

/// Opens a [`VideoSource`] for a file on disk
pub trait SourceOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RecognitionError::SourceOpenFailure`] if the file cannot be opened as a video.
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>>;
}

/// Ordered sequence of exactly `N` RGB frames at a fixed resolution
#[derive(Debug, Clone)]
pub struct FrameBatch {
    frames: Vec<RgbImage>,
    width: u32,
    height: u32,
    padded_frames: usize,
}

impl FrameBatch {
    /// Build a batch, enforcing the length and resolution invariants
    ///
    /// `padded_frames` counts entries that repeat an earlier frame (short-video padding or
    /// carry-forward after a failed decode).
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::ExtractionIncomplete`] if `frames.len() != expected`, and
    /// [`RecognitionError::Image`] if a frame does not have the batch resolution.
    pub fn new(
        frames: Vec<RgbImage>,
        expected: usize,
        (width, height): (u32, u32),
        padded_frames: usize,
    ) -> Result<Self> {
        if frames.len() != expected {
            return Err(RecognitionError::ExtractionIncomplete {
                got: frames.len(),
                expected,
            });
        }
        if let Some(frame) = frames.iter().find(|f| f.dimensions() != (width, height)) {
            return Err(RecognitionError::Image(format!(
                "frame is {}x{}, batch expects {width}x{height}",
                frame.width(),
                frame.height()
            )));
        }
        Ok(Self {
            frames,
            width,
            height,
            padded_frames,
        })
    }

    #[must_use]
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame resolution as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of entries that repeat an earlier frame
    #[must_use]
    pub fn padded_frames(&self) -> usize {
        self.padded_frames
    }

    /// True if any entry was padded or carried forward
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.padded_frames > 0
    }
}
