//! Sequential batch processing with per-item failure isolation

use crate::{PipelineRunner, Prediction, VideoUpload};
use action_recognition_common::{round2, ErrorKind, RecognitionError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Result for one item of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success {
        filename: String,
        #[serde(flatten)]
        prediction: Prediction,
    },
    Failed {
        filename: String,
        success: bool,
        kind: ErrorKind,
        error: String,
    },
}

impl PipelineOutcome {
    fn from_result(filename: &str, result: Result<Prediction>) -> Self {
        match result {
            Ok(prediction) => PipelineOutcome::Success {
                filename: filename.to_string(),
                prediction,
            },
            Err(e) => PipelineOutcome::Failed {
                filename: filename.to_string(),
                success: false,
                kind: e.kind(),
                error: e.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        match self {
            PipelineOutcome::Success { filename, .. } | PipelineOutcome::Failed { filename, .. } => {
                filename
            }
        }
    }

    /// Error kind of a failed item
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineOutcome::Success { .. } => None,
            PipelineOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Aggregate result of a batch, one entry per input in input order
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub total_videos: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<PipelineOutcome>,
    pub total_processing_time_ms: f64,
}

/// Runs a [`PipelineRunner`] over several uploads, one at a time
pub struct BatchCoordinator {
    runner: Arc<PipelineRunner>,
    max_items: usize,
}

impl BatchCoordinator {
    #[must_use]
    pub fn new(runner: Arc<PipelineRunner>, max_items: usize) -> Self {
        Self { runner, max_items }
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Process every upload sequentially
    ///
    /// Any failure of one item, including a panic, becomes a failed entry and the batch
    /// continues. `success` is true only when no item failed.
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::TooManyItems`] before processing anything when more than
    /// `max_items` uploads are given.
    pub fn run_batch(&self, items: &[VideoUpload]) -> Result<BatchOutcome> {
        if items.len() > self.max_items {
            return Err(RecognitionError::TooManyItems {
                count: items.len(),
                max: self.max_items,
            });
        }

        let start = Instant::now();
        info!("Processing batch of {} videos", items.len());

        let results: Vec<PipelineOutcome> = items
            .iter()
            .map(|item| {
                let result = self.runner.run_isolated(item);
                if let Err(e) = &result {
                    match e.kind() {
                        ErrorKind::UnexpectedFailure => {
                            error!("Batch item {} failed: {e}", item.filename);
                        }
                        _ => warn!("Batch item {} failed: {e}", item.filename),
                    }
                }
                PipelineOutcome::from_result(&item.filename, result)
            })
            .collect();

        let successful = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - successful;
        let total_processing_time_ms = round2(start.elapsed().as_secs_f64() * 1000.0);

        info!(
            "Batch complete: {successful} succeeded, {failed} failed in {total_processing_time_ms} ms"
        );

        Ok(BatchOutcome {
            success: failed == 0,
            total_videos: items.len(),
            successful,
            failed,
            results,
            total_processing_time_ms,
        })
    }
}
