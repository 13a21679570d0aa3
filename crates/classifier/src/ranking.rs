//! Top-k ranking of a probability vector

use crate::PredictionVector;
use action_recognition_common::RankedPrediction;

/// Label for a class index, falling back to `Class {idx}` when the label list is short
pub(crate) fn label_for(labels: &[String], class_index: usize) -> String {
    labels
        .get(class_index)
        .cloned()
        .unwrap_or_else(|| format!("Class {class_index}"))
}

/// Rank the `k` most confident classes
///
/// Returns `min(k, C)` entries ordered by descending confidence; equal confidences keep
/// the lower class index first. Ranks start at 1.
#[must_use]
pub fn top_k(prediction: &PredictionVector, labels: &[String], k: usize) -> Vec<RankedPrediction> {
    let mut indexed: Vec<(usize, f32)> = prediction
        .probabilities()
        .iter()
        .copied()
        .enumerate()
        .collect();

    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    indexed
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(position, (class_index, confidence))| RankedPrediction {
            rank: position + 1,
            action: label_for(labels, class_index),
            confidence,
            class_index,
        })
        .collect()
}
