//! Predict command: one file runs the single-video pipeline, several run batches

use super::load_settings;
use action_recognition_classifier::Classifier;
use action_recognition_pipeline::{
    BatchCoordinator, BatchOutcome, PipelineOutcome, PipelineRunner, Prediction, VideoUpload,
};
use anyhow::{Context as _, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args)]
pub struct PredictCommand {
    /// Input video files
    #[arg(value_name = "FILES", required = true)]
    inputs: Vec<PathBuf>,

    /// YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model path (overrides settings)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Number of ranked predictions to report
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl PredictCommand {
    pub fn execute(self) -> Result<()> {
        let mut settings = load_settings(self.config.as_deref(), self.model.as_ref())?;
        if let Some(k) = self.top_k {
            settings.top_k = k;
        }

        let valid_inputs: Vec<PathBuf> = self
            .inputs
            .iter()
            .filter(|path| {
                if path.is_file() {
                    true
                } else {
                    warn!("Skipping non-existent file: {}", path.display());
                    false
                }
            })
            .cloned()
            .collect();

        if valid_inputs.is_empty() {
            anyhow::bail!("No valid input files found");
        }

        let classifier = Arc::new(Classifier::load(&settings));
        if !classifier.is_ready() {
            anyhow::bail!(
                "Model could not be loaded from {}",
                settings.model_path.display()
            );
        }
        let runner = Arc::new(PipelineRunner::from_settings(&settings, classifier));

        let uploads = valid_inputs
            .iter()
            .map(|path| {
                let data = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
                Ok(VideoUpload::new(filename, data))
            })
            .collect::<Result<Vec<_>>>()?;

        if let [upload] = uploads.as_slice() {
            let prediction = runner.run_isolated(upload)?;
            if self.json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else {
                print_prediction(&prediction);
            }
            return Ok(());
        }

        let coordinator = BatchCoordinator::new(runner, settings.max_batch_items.max(1));
        let mut outcomes = Vec::new();
        for chunk in uploads.chunks(coordinator.max_items()) {
            info!("Running batch of {} files", chunk.len());
            outcomes.push(coordinator.run_batch(chunk)?);
        }

        if self.json {
            let value = if let [outcome] = outcomes.as_slice() {
                serde_json::to_value(outcome)?
            } else {
                serde_json::to_value(&outcomes)?
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            outcomes.iter().for_each(print_batch);
        }

        if outcomes.iter().any(|o| !o.success) {
            anyhow::bail!("One or more files failed");
        }
        Ok(())
    }
}

fn print_prediction(prediction: &Prediction) {
    let video = &prediction.video_info;
    println!("{}", video.filename);
    println!("  {}", prediction.message);
    println!(
        "  {}x{} @ {} fps, {} frames ({} s), {} MB",
        video.metadata.width,
        video.metadata.height,
        video.metadata.fps,
        video.metadata.total_frames,
        video.metadata.duration_seconds,
        video.size_mb
    );
    if video.padded_frames > 0 {
        println!("  Note: {} sampled frames were repeated", video.padded_frames);
    }
    for ranked in &prediction.top_predictions {
        println!(
            "  {}. {:<20} {:>6.2}%",
            ranked.rank,
            ranked.action,
            ranked.confidence * 100.0
        );
    }
    println!("  Processed in {} ms", prediction.processing_time_ms);
}

fn print_batch(outcome: &BatchOutcome) {
    for result in &outcome.results {
        match result {
            PipelineOutcome::Success { prediction, .. } => print_prediction(prediction),
            PipelineOutcome::Failed {
                filename, error, ..
            } => {
                println!("{filename}");
                println!("  Failed: {error}");
            }
        }
    }
    println!(
        "{}/{} succeeded in {} ms",
        outcome.successful, outcome.total_videos, outcome.total_processing_time_ms
    );
}
