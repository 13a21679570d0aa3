//! ONNX Runtime backend for the classifier
//!
//! The session is created once with graph optimizations and intra-op parallelism
//! tuned to the machine. `Session::run` needs `&mut self`, so the session sits behind a
//! mutex; concurrent callers serialize inside ONNX Runtime only.

use crate::InferenceBackend;
use action_recognition_common::{RecognitionError, Result};
use ndarray::ArrayView5;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Error type for ONNX model loading
#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error("Failed to create session builder: {0}")]
    SessionBuilderError(String),

    #[error("Failed to load ONNX model from {path}: {error}")]
    ModelLoadError { path: String, error: String },

    #[error("Model file not found: {0}")]
    ModelNotFound(String),
}

/// Intra-op thread count: `ACTION_INTRA_THREADS` if set, otherwise physical cores
fn intra_threads() -> usize {
    std::env::var("ACTION_INTRA_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(num_cpus::get_physical)
}

/// Create an optimized CPU session for `model_path`
///
/// # Errors
///
/// Returns an error if the file does not exist or ONNX Runtime rejects the model.
pub fn create_session(model_path: &Path) -> std::result::Result<Session, OnnxError> {
    if !model_path.exists() {
        return Err(OnnxError::ModelNotFound(model_path.display().to_string()));
    }

    let num_threads = intra_threads();
    debug!("Creating ONNX session with {num_threads} intra-op threads");

    Session::builder()
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_intra_threads(num_threads)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_memory_pattern(true)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| OnnxError::ModelLoadError {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })
}

/// Classifier backend running an ONNX export of the model
pub struct OnnxBackend {
    session: Mutex<Session>,
}

impl OnnxBackend {
    /// Load the model artifact
    ///
    /// # Errors
    ///
    /// See [`create_session`].
    pub fn load(model_path: &Path) -> std::result::Result<Self, OnnxError> {
        info!("Loading action recognition model from {}", model_path.display());
        let session = create_session(model_path)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&self, input: ArrayView5<'_, f32>) -> Result<Vec<f32>> {
        let input_tensor = TensorRef::from_array_view(input)
            .map_err(|e| RecognitionError::Unexpected(format!("Invalid input tensor: {e}")))?;

        let mut session = self.session.lock().map_err(|e| {
            RecognitionError::Unexpected(format!("Failed to lock session mutex: {e}"))
        })?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| RecognitionError::Unexpected(format!("Inference failed: {e}")))?;

        // (1, C) probabilities
        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            RecognitionError::Unexpected(format!("Failed to extract tensor: {e}"))
        })?;
        debug!("ONNX output shape: {:?}", shape);

        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found() {
        let result = create_session(Path::new("nonexistent_model.onnx"));
        assert!(matches!(result, Err(OnnxError::ModelNotFound(_))));
    }

    #[test]
    fn test_error_display() {
        let err = OnnxError::ModelLoadError {
            path: "model.onnx".to_string(),
            error: "invalid format".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load ONNX model from model.onnx: invalid format"
        );
    }
}
