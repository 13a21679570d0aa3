pub mod info;
pub mod predict;

use action_recognition_common::Settings;
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// Settings from an optional YAML file plus environment, with an optional model override
pub fn load_settings(config: Option<&Path>, model: Option<&PathBuf>) -> Result<Settings> {
    let mut settings = Settings::load(config).context("Failed to load settings")?;
    if let Some(model) = model {
        settings.model_path = model.clone();
    }
    Ok(settings)
}
