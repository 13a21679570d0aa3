/// Classifier behavior over in-process backends
use action_recognition_classifier::{Classifier, InferenceBackend, PredictionVector};
use action_recognition_common::{FrameBatch, InputShape, RecognitionError, Result, Settings};
use image::{Rgb, RgbImage};
use ndarray::ArrayView5;
use std::path::Path;
use std::sync::Mutex;

const SHAPE: InputShape = InputShape {
    num_frames: 4,
    height: 8,
    width: 8,
    channels: 3,
};

fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("action_{i}")).collect()
}

fn batch(pixel: u8) -> FrameBatch {
    let frames = vec![RgbImage::from_pixel(8, 8, Rgb([pixel, pixel, pixel])); 4];
    FrameBatch::new(frames, 4, (8, 8), 0).unwrap()
}

/// Returns fixed scores and records the largest input value it saw
struct FixedBackend {
    scores: Vec<f32>,
    max_input: Mutex<Option<f32>>,
}

impl FixedBackend {
    fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            max_input: Mutex::new(None),
        }
    }
}

impl InferenceBackend for FixedBackend {
    fn infer(&self, input: ArrayView5<'_, f32>) -> Result<Vec<f32>> {
        assert_eq!(input.shape(), &[1, 4, 8, 8, 3]);
        let max = input.iter().copied().fold(f32::MIN, f32::max);
        *self.max_input.lock().unwrap() = Some(max);
        Ok(self.scores.clone())
    }
}

/// Forwards to a shared [`FixedBackend`] so the test can inspect it afterwards
struct Shared(std::sync::Arc<FixedBackend>);

impl InferenceBackend for Shared {
    fn infer(&self, input: ArrayView5<'_, f32>) -> Result<Vec<f32>> {
        self.0.infer(input)
    }
}

fn classifier(scores: Vec<f32>) -> Classifier {
    let n = scores.len();
    Classifier::with_backend(
        labels(n),
        SHAPE,
        Path::new("model/test.onnx"),
        Box::new(FixedBackend::new(scores)),
    )
}

#[test]
fn test_unloaded_classifier_is_not_ready() {
    let classifier = Classifier::unloaded(labels(3), SHAPE, Path::new("missing.onnx"));
    assert!(!classifier.is_ready());

    let err = classifier.predict(&batch(10)).unwrap_err();
    assert!(matches!(err, RecognitionError::ModelNotReady));

    // metadata stays available
    let info = classifier.info();
    assert!(!info.is_loaded);
    assert_eq!(info.num_classes, 3);
    assert_eq!(info.model_name, "missing");
}

#[test]
fn test_load_with_missing_model_is_degraded() {
    let settings = Settings {
        model_path: "/nonexistent/model.onnx".into(),
        ..Default::default()
    };
    let classifier = Classifier::load(&settings);

    assert!(!classifier.is_ready());
    assert_eq!(classifier.num_classes(), 11);
    assert_eq!(classifier.input_shape().as_tuple(), (16, 112, 112, 3));
}

#[test]
fn test_prediction_is_distribution() {
    let classifier = classifier(vec![3.0, -1.0, 0.5, 0.5, 2.0]);
    let prediction = classifier.predict(&batch(200)).unwrap();

    assert_eq!(prediction.len(), 5);
    let sum: f32 = prediction.probabilities().iter().sum();
    assert!((sum - 1.0).abs() <= 1e-3);
    assert!(prediction.probabilities().iter().all(|p| (0.0..=1.0).contains(p)));
    assert_eq!(prediction.argmax(), 0);
}

#[test]
fn test_top1_matches_argmax() {
    let classifier = classifier(vec![0.05, 0.15, 0.6, 0.2]);
    let prediction = classifier.predict(&batch(50)).unwrap();
    let ranked = classifier.top_k(&prediction, 3);

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].class_index, prediction.argmax());
    assert_eq!(ranked[0].action, "action_2");
    assert_eq!(ranked[0].confidence, prediction.confidence());
    assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn test_raw_pixels_are_scaled() {
    let backend = std::sync::Arc::new(FixedBackend::new(vec![0.5, 0.5]));
    let classifier = Classifier::with_backend(
        labels(2),
        SHAPE,
        Path::new("m.onnx"),
        Box::new(Shared(backend.clone())),
    );

    classifier.predict(&batch(255)).unwrap();
    let max = backend.max_input.lock().unwrap().unwrap();
    assert!((max - 1.0).abs() < 1e-6, "expected scaled input, got {max}");
}

#[test]
fn test_near_black_frames_are_not_rescaled() {
    let backend = std::sync::Arc::new(FixedBackend::new(vec![0.5, 0.5]));
    let classifier = Classifier::with_backend(
        labels(2),
        SHAPE,
        Path::new("m.onnx"),
        Box::new(Shared(backend.clone())),
    );

    classifier.predict(&batch(1)).unwrap();
    assert_eq!(*backend.max_input.lock().unwrap(), Some(1.0));
}

#[test]
fn test_wrong_batch_length() {
    let classifier = classifier(vec![0.5, 0.5]);
    let frames = vec![RgbImage::new(8, 8); 3];
    let short = FrameBatch::new(frames, 3, (8, 8), 0).unwrap();

    let err = classifier.predict(&short).unwrap_err();
    assert!(matches!(
        err,
        RecognitionError::ExtractionIncomplete {
            got: 3,
            expected: 4
        }
    ));
}

#[test]
fn test_score_count_mismatch() {
    let classifier = Classifier::with_backend(
        labels(3),
        SHAPE,
        Path::new("m.onnx"),
        Box::new(FixedBackend::new(vec![0.5, 0.5])),
    );
    let err = classifier.predict(&batch(10)).unwrap_err();
    assert!(matches!(err, RecognitionError::Unexpected(_)));
}

#[test]
fn test_tied_scores_rank_lower_index_first() {
    let pv = PredictionVector::from_scores(vec![0.3, 0.3, 0.3, 0.1]).unwrap();
    let ranked = action_recognition_classifier::top_k(&pv, &labels(4), 4);
    let order: Vec<usize> = ranked.iter().map(|r| r.class_index).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_infinite_logit_fails_prediction() {
    let classifier = classifier(vec![f32::INFINITY, 0.0, 1.0]);
    let err = classifier.predict(&batch(10)).unwrap_err();
    assert!(matches!(err, RecognitionError::Unexpected(_)));
}
