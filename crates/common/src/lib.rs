/// Common types and utilities for action recognition
mod error;
mod settings;
mod video;

pub use error::{ErrorCategory, ErrorKind, RecognitionError, Result};
pub use settings::{Settings, UCF11_CLASSES};
pub use video::{FrameBatch, SourceOpener, VideoProperties, VideoSource};

use serde::{Deserialize, Serialize};

/// Video metadata reported alongside a prediction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

impl VideoMetadata {
    /// Derive metadata from native properties; `fps` and duration are rounded to 2 decimals
    #[must_use]
    pub fn from_properties(props: &VideoProperties) -> Self {
        let duration = if props.fps > 0.0 {
            props.total_frames as f64 / props.fps
        } else {
            0.0
        };
        Self {
            fps: round2(props.fps),
            total_frames: props.total_frames,
            width: props.width,
            height: props.height,
            duration_seconds: round2(duration),
        }
    }
}

/// Metadata of one processed upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(flatten)]
    pub metadata: VideoMetadata,
    pub filename: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    /// Sampled entries that repeat an earlier frame (padding or carry-forward)
    pub padded_frames: usize,
}

impl VideoInfo {
    #[must_use]
    pub fn new(metadata: VideoMetadata, filename: &str, size_bytes: u64) -> Self {
        Self {
            metadata,
            filename: filename.to_string(),
            size_bytes,
            size_mb: round2(size_bytes as f64 / (1024.0 * 1024.0)),
            padded_frames: 0,
        }
    }
}

/// One entry of a top-k result; rank 1 is the most confident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    pub rank: usize,
    pub action: String,
    pub confidence: f32,
    pub class_index: usize,
}

/// Classifier input shape `(N, H, W, C)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub num_frames: usize,
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

impl InputShape {
    #[must_use]
    pub fn as_tuple(&self) -> (usize, u32, u32, u32) {
        (self.num_frames, self.height, self.width, self.channels)
    }
}

/// Round to 2 decimal places
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
