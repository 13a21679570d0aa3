//! Model information command

use super::load_settings;
use action_recognition_classifier::Classifier;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct InfoCommand {
    /// YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model path (overrides settings)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl InfoCommand {
    pub fn execute(self) -> Result<()> {
        let settings = load_settings(self.config.as_deref(), self.model.as_ref())?;
        let info = Classifier::load(&settings).info();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
            return Ok(());
        }

        println!("Model: {} ({})", info.model_name, info.model_path);
        println!("Loaded: {}", if info.is_loaded { "yes" } else { "no" });
        println!("Input shape: {:?}", info.input_shape.as_tuple());
        println!("Classes ({}):", info.num_classes);
        for (i, class) in info.classes.iter().enumerate() {
            println!("  {i:>3}  {class}");
        }
        Ok(())
    }
}
