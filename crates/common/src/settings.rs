//! Service settings with YAML and environment variable support

use crate::{InputShape, RecognitionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// UCF11 action classes, in the sorted order the model was trained with
pub const UCF11_CLASSES: [&str; 11] = [
    "basketball",
    "biking",
    "diving",
    "golf_swing",
    "horse_riding",
    "soccer_juggling",
    "swing",
    "tennis_swing",
    "trampoline_jumping",
    "volleyball_spiking",
    "walking",
];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,

    /// ONNX model artifact
    pub model_path: PathBuf,
    /// Optional label file, one label per line; overrides `labels`
    pub labels_path: Option<PathBuf>,
    /// Ordered label list (index = model output index)
    pub labels: Vec<String>,

    /// Frames sampled per clip (N)
    pub num_frames: usize,
    pub frame_width: u32,
    pub frame_height: u32,

    /// Maximum upload size in bytes
    pub max_file_size: u64,
    /// Accepted filename extensions, lowercase with leading dot
    pub allowed_extensions: Vec<String>,
    /// Directory for per-request temporary files
    pub upload_dir: PathBuf,
    pub max_batch_items: usize,
    pub top_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Action Recognition API".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            model_path: PathBuf::from("model/action_recognition.onnx"),
            labels_path: None,
            labels: UCF11_CLASSES.iter().map(|s| (*s).to_string()).collect(),
            num_frames: 16,
            frame_width: 112,
            frame_height: 112,
            max_file_size: 100 * 1024 * 1024,
            allowed_extensions: [".mp4", ".avi", ".mov", ".mkv", ".mpg", ".mpeg", ".webm"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            upload_dir: std::env::temp_dir().join("action-recognition-uploads"),
            max_batch_items: 10,
            top_k: 5,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file; missing fields keep their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml(yaml_path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(yaml_path.as_ref())?;
        serde_yaml::from_str(&contents).map_err(|e| {
            RecognitionError::Unexpected(format!(
                "Failed to parse settings {}: {e}",
                yaml_path.as_ref().display()
            ))
        })
    }

    /// Load settings: defaults, then the optional YAML file, then environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if `yaml_path` is given and cannot be loaded.
    pub fn load(yaml_path: Option<&Path>) -> Result<Self> {
        let settings = match yaml_path {
            Some(path) => {
                info!("Loading settings from {}", path.display());
                Self::from_yaml(path)?
            }
            None => Self::default(),
        };
        Ok(settings.with_env_overrides())
    }

    /// Apply `ACTION_*` environment variable overrides
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup("ACTION_HOST") {
            self.host = host;
        }
        if let Some(path) = lookup("ACTION_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("ACTION_LABELS_PATH") {
            self.labels_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("ACTION_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        parse_override(&lookup, "ACTION_PORT", &mut self.port);
        parse_override(&lookup, "ACTION_NUM_FRAMES", &mut self.num_frames);
        parse_override(&lookup, "ACTION_FRAME_WIDTH", &mut self.frame_width);
        parse_override(&lookup, "ACTION_FRAME_HEIGHT", &mut self.frame_height);
        parse_override(&lookup, "ACTION_MAX_FILE_SIZE", &mut self.max_file_size);
        parse_override(&lookup, "ACTION_MAX_BATCH_ITEMS", &mut self.max_batch_items);
        parse_override(&lookup, "ACTION_TOP_K", &mut self.top_k);
        self
    }

    /// Ordered label list, read from `labels_path` when set
    ///
    /// # Errors
    ///
    /// Returns an error if the label file cannot be read or contains no labels.
    pub fn load_labels(&self) -> Result<Vec<String>> {
        let Some(path) = &self.labels_path else {
            return Ok(self.labels.clone());
        };

        let content = std::fs::read_to_string(path)?;
        let labels: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if labels.is_empty() {
            return Err(RecognitionError::Unexpected(format!(
                "Label file {} is empty",
                path.display()
            )));
        }
        Ok(labels)
    }

    /// Model input shape `(N, H, W, 3)`
    #[must_use]
    pub fn input_shape(&self) -> InputShape {
        InputShape {
            num_frames: self.num_frames,
            height: self.frame_height,
            width: self.frame_width,
            channels: 3,
        }
    }

    /// Bind address for the HTTP server
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => warn!("Ignoring invalid value for {key}: {raw:?}"),
        }
    }
}
