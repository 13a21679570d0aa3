//! Action Recognize CLI
//!
//! Command-line front end for classifying the action performed in video clips.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::info::InfoCommand;
use commands::predict::PredictCommand;

#[derive(Parser)]
#[command(
    name = "action-recognize",
    version,
    about = "Recognize human actions in video clips",
    after_help = "EXAMPLES:\n  \
                  # Classify one clip\n  \
                  action-recognize predict clip.mp4\n\n  \
                  # Classify several clips, JSON output\n  \
                  action-recognize predict --json a.mp4 b.avi c.mov\n\n  \
                  # Show model status and labels\n  \
                  action-recognize info --config config.yaml"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more video files
    Predict(PredictCommand),

    /// Show model status, labels and input shape
    Info(InfoCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Predict(cmd) => cmd.execute(),
        Commands::Info(cmd) => cmd.execute(),
    }
}
