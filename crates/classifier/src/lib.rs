//! Action classifier
//!
//! Maps a [`FrameBatch`] of `N` RGB frames to a probability distribution over the
//! configured action classes, then ranks the result.
//!
//! # Pipeline
//! 1. Batch → tensor `(1, N, H, W, 3)` of `f32`, scaled to `[0, 1]` when raw pixel
//!    values are detected (max > 1.0)
//! 2. Backend inference (ONNX Runtime by default) returning one score per class
//! 3. Scores are used directly when they already form a distribution; otherwise softmax
//!    is applied
//!
//! A classifier without a loaded backend stays usable for metadata queries and reports
//! [`RecognitionError::ModelNotReady`] on prediction.

pub mod onnx;
mod ranking;

pub use onnx::{OnnxBackend, OnnxError};
pub use ranking::top_k;

use action_recognition_common::{
    FrameBatch, InputShape, RankedPrediction, RecognitionError, Result, Settings,
};
use ndarray::{Array5, ArrayView5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Tolerance when checking whether raw scores already sum to 1
const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Inference engine behind the classifier
///
/// Receives a `(1, N, H, W, 3)` tensor and returns one score per class.
pub trait InferenceBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn infer(&self, input: ArrayView5<'_, f32>) -> Result<Vec<f32>>;
}

/// Probability distribution over the action classes
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionVector {
    probabilities: Vec<f32>,
}

impl PredictionVector {
    /// Build a distribution from raw model scores
    ///
    /// Scores that are all within `[0, 1]` and sum to 1 (within 1e-3) are kept as-is;
    /// anything else is treated as logits and passed through softmax.
    ///
    /// # Errors
    ///
    /// Returns an error if the scores are empty or contain NaN or infinite values.
    pub fn from_scores(scores: Vec<f32>) -> Result<Self> {
        if scores.is_empty() {
            return Err(RecognitionError::Unexpected(
                "Model returned no scores".to_string(),
            ));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(RecognitionError::Unexpected(
                "Model returned non-finite scores".to_string(),
            ));
        }

        if is_distribution(&scores) {
            return Ok(Self {
                probabilities: scores,
            });
        }

        debug!("Scores are not a distribution, applying softmax");
        Ok(Self {
            probabilities: softmax(&scores),
        })
    }

    #[must_use]
    pub fn probabilities(&self) -> &[f32] {
        &self.probabilities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Index of the highest probability; the first maximum wins
    #[must_use]
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, p) in self.probabilities.iter().enumerate() {
            if *p > self.probabilities[best] {
                best = i;
            }
        }
        best
    }

    /// Probability of the argmax class
    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.probabilities[self.argmax()]
    }
}

fn is_distribution(scores: &[f32]) -> bool {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    in_range && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Model description for the info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_path: String,
    pub num_classes: usize,
    pub classes: Vec<String>,
    pub input_shape: InputShape,
    pub is_loaded: bool,
}

/// Action classifier: labels, expected input shape and an optional backend
pub struct Classifier {
    labels: Vec<String>,
    input_shape: InputShape,
    model_path: PathBuf,
    backend: Option<Box<dyn InferenceBackend>>,
}

impl Classifier {
    /// Load labels and the ONNX model named in `settings`
    ///
    /// Never fails: when labels or the model cannot be loaded the failure is logged and
    /// the returned classifier reports `is_ready() == false`.
    #[must_use]
    pub fn load(settings: &Settings) -> Self {
        let input_shape = settings.input_shape();
        let labels = match settings.load_labels() {
            Ok(labels) => labels,
            Err(e) => {
                error!("Failed to load class labels: {e}");
                return Self::unloaded(settings.labels.clone(), input_shape, &settings.model_path);
            }
        };

        match OnnxBackend::load(&settings.model_path) {
            Ok(backend) => {
                info!(
                    "Model loaded: {} classes, input shape {:?}",
                    labels.len(),
                    input_shape.as_tuple()
                );
                Self::with_backend(labels, input_shape, &settings.model_path, Box::new(backend))
            }
            Err(e) => {
                error!("Failed to load model: {e}");
                Self::unloaded(labels, input_shape, &settings.model_path)
            }
        }
    }

    /// Classifier over an explicit backend
    #[must_use]
    pub fn with_backend(
        labels: Vec<String>,
        input_shape: InputShape,
        model_path: &Path,
        backend: Box<dyn InferenceBackend>,
    ) -> Self {
        Self {
            labels,
            input_shape,
            model_path: model_path.to_path_buf(),
            backend: Some(backend),
        }
    }

    /// Classifier with no backend; every prediction fails with `ModelNotReady`
    #[must_use]
    pub fn unloaded(labels: Vec<String>, input_shape: InputShape, model_path: &Path) -> Self {
        Self {
            labels,
            input_shape,
            model_path: model_path.to_path_buf(),
            backend: None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn input_shape(&self) -> InputShape {
        self.input_shape
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    #[must_use]
    pub fn info(&self) -> ModelInfo {
        let model_name = self
            .model_path
            .file_stem()
            .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned());
        ModelInfo {
            model_name,
            model_path: self.model_path.display().to_string(),
            num_classes: self.num_classes(),
            classes: self.labels.clone(),
            input_shape: self.input_shape,
            is_loaded: self.is_ready(),
        }
    }

    /// Classify a frame batch
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No backend is loaded ([`RecognitionError::ModelNotReady`])
    /// - The batch length differs from the model's frame count
    ///   ([`RecognitionError::ExtractionIncomplete`])
    /// - The frame resolution or the number of scores does not match the model
    /// - Inference fails
    pub fn predict(&self, batch: &FrameBatch) -> Result<PredictionVector> {
        let Some(backend) = &self.backend else {
            return Err(RecognitionError::ModelNotReady);
        };

        if batch.len() != self.input_shape.num_frames {
            return Err(RecognitionError::ExtractionIncomplete {
                got: batch.len(),
                expected: self.input_shape.num_frames,
            });
        }
        let expected_dims = (self.input_shape.width, self.input_shape.height);
        if batch.dimensions() != expected_dims {
            return Err(RecognitionError::Unexpected(format!(
                "Frame size {:?} does not match model input {:?}",
                batch.dimensions(),
                expected_dims
            )));
        }

        let input = to_input_tensor(batch)?;
        let scores = backend.infer(input.view())?;

        if scores.len() != self.labels.len() {
            return Err(RecognitionError::Unexpected(format!(
                "Model returned {} scores for {} classes",
                scores.len(),
                self.labels.len()
            )));
        }

        let prediction = PredictionVector::from_scores(scores)?;
        if batch.is_degraded() {
            warn!(
                "Prediction made on degraded input ({} repeated frames)",
                batch.padded_frames()
            );
        }
        Ok(prediction)
    }

    /// Rank the `k` most confident classes of a prediction
    #[must_use]
    pub fn top_k(&self, prediction: &PredictionVector, k: usize) -> Vec<RankedPrediction> {
        top_k(prediction, &self.labels, k)
    }

    /// Label for a class index
    #[must_use]
    pub fn label(&self, class_index: usize) -> String {
        ranking::label_for(&self.labels, class_index)
    }
}

/// Convert a batch to a `(1, N, H, W, 3)` tensor
///
/// Pixel values are divided by 255 when any channel exceeds 1.0, which is always the
/// case for 8-bit frames that are not fully black.
///
/// # Errors
///
/// Returns an error if the frame buffers do not fill the batch shape.
pub fn to_input_tensor(batch: &FrameBatch) -> Result<Array5<f32>> {
    let (width, height) = batch.dimensions();
    let shape = (1, batch.len(), height as usize, width as usize, 3);

    let data: Vec<f32> = batch
        .frames()
        .iter()
        .flat_map(|frame| frame.as_raw().iter().map(|&v| f32::from(v)))
        .collect();

    let scale = if data.iter().any(|&v| v > 1.0) {
        1.0 / 255.0
    } else {
        1.0
    };

    let tensor = Array5::from_shape_vec(shape, data)
        .map_err(|e| RecognitionError::Unexpected(format!("Invalid batch tensor: {e}")))?;
    Ok(tensor.mapv(|v| v * scale))
}
