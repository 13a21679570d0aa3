//! Recognition pipeline
//!
//! [`PipelineRunner`] takes one uploaded video from raw bytes to a ranked prediction:
//! validation, scoped temp file, frame sampling, classification and ranking.
//! [`BatchCoordinator`] runs it over several uploads with per-item failure isolation.

mod batch;

pub use batch::{BatchCoordinator, BatchOutcome, PipelineOutcome};

use action_recognition_classifier::Classifier;
use action_recognition_common::{
    round2, RankedPrediction, RecognitionError, Result, Settings, SourceOpener, VideoInfo,
};
use action_recognition_decoder::FfmpegOpener;
use action_recognition_sampler::FrameSampler;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// One uploaded video: original filename plus raw bytes
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

impl VideoUpload {
    #[must_use]
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// Lowercase extension including the leading dot, or an empty string
    #[must_use]
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }
}

/// Top-1 result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPrediction {
    pub action: String,
    pub confidence: f32,
    pub class_index: usize,
}

/// Successful single-video result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub success: bool,
    pub prediction: TopPrediction,
    pub top_predictions: Vec<RankedPrediction>,
    pub processing_time_ms: f64,
    pub video_info: VideoInfo,
    pub message: String,
}

/// Runs one video through sampling, classification and ranking
pub struct PipelineRunner {
    classifier: Arc<Classifier>,
    opener: Arc<dyn SourceOpener>,
    sampler: FrameSampler,
    allowed_extensions: Vec<String>,
    max_file_size: u64,
    upload_dir: PathBuf,
    top_k: usize,
}

impl PipelineRunner {
    /// Runner decoding with FFmpeg
    #[must_use]
    pub fn from_settings(settings: &Settings, classifier: Arc<Classifier>) -> Self {
        Self::new(settings, classifier, Arc::new(FfmpegOpener))
    }

    /// Runner over an explicit source opener
    #[must_use]
    pub fn new(
        settings: &Settings,
        classifier: Arc<Classifier>,
        opener: Arc<dyn SourceOpener>,
    ) -> Self {
        Self {
            classifier,
            opener,
            sampler: FrameSampler::from_settings(settings),
            allowed_extensions: settings
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            max_file_size: settings.max_file_size,
            upload_dir: settings.upload_dir.clone(),
            top_k: settings.top_k,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Directory receiving the scoped upload files
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Validate upload metadata without touching the bytes' content
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::UnsupportedFormat`] or [`RecognitionError::SizeExceeded`].
    pub fn validate(&self, upload: &VideoUpload) -> Result<()> {
        let extension = upload.extension();
        if !self.allowed_extensions.contains(&extension) {
            return Err(RecognitionError::UnsupportedFormat {
                extension,
                allowed: self.allowed_extensions.join(", "),
            });
        }

        let size = upload.data.len() as u64;
        if size > self.max_file_size {
            return Err(RecognitionError::SizeExceeded {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Process one upload end to end
    ///
    /// The bytes are written to a uniquely named file in the upload directory that is
    /// removed when this call returns, on success, on error and during a panic unwind.
    ///
    /// # Errors
    ///
    /// Returns the first failure of any stage; see [`RecognitionError`].
    pub fn run(&self, upload: &VideoUpload) -> Result<Prediction> {
        let start = Instant::now();

        self.validate(upload)?;
        if !self.classifier.is_ready() {
            return Err(RecognitionError::ModelNotReady);
        }

        std::fs::create_dir_all(&self.upload_dir)?;
        let mut temp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&upload.extension())
            .tempfile_in(&self.upload_dir)?;
        temp.write_all(&upload.data)?;
        temp.flush()?;
        debug!(
            "Stored {} ({} bytes) at {}",
            upload.filename,
            upload.data.len(),
            temp.path().display()
        );

        let (metadata, batch) = {
            let mut source = self.opener.open(temp.path())?;
            let metadata = self.sampler.describe(source.as_ref());
            let batch = self.sampler.extract(source.as_mut())?;
            (metadata, batch)
        };

        let probabilities = self.classifier.predict(&batch)?;
        let top_predictions = self.classifier.top_k(&probabilities, self.top_k);

        let class_index = probabilities.argmax();
        let confidence = probabilities.confidence();
        let action = self.classifier.label(class_index);

        let mut video_info = VideoInfo::new(metadata, &upload.filename, upload.data.len() as u64);
        video_info.padded_frames = batch.padded_frames();

        let processing_time_ms = round2(start.elapsed().as_secs_f64() * 1000.0);
        info!(
            "{}: {action} ({:.1}%) in {processing_time_ms} ms",
            upload.filename,
            confidence * 100.0
        );

        Ok(Prediction {
            success: true,
            message: format!(
                "Action recognized: {action} ({:.1}% confidence)",
                confidence * 100.0
            ),
            prediction: TopPrediction {
                action,
                confidence,
                class_index,
            },
            top_predictions,
            processing_time_ms,
            video_info,
        })
    }

    /// [`run`](Self::run) with panics converted to [`RecognitionError::Unexpected`]
    ///
    /// # Errors
    ///
    /// Returns every error of [`run`](Self::run), plus `Unexpected` for a panic.
    pub fn run_isolated(&self, upload: &VideoUpload) -> Result<Prediction> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(upload))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Unexpected failure processing {}: {message}", upload.filename);
                Err(RecognitionError::Unexpected(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
