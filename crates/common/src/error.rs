//! Error taxonomy shared by every stage of the recognition pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recognition errors
///
/// Every variant reports one [`ErrorKind`]. Conversions from I/O and image errors
/// report [`ErrorKind::UnexpectedFailure`].
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("File format '{extension}' not supported. Allowed: {allowed}")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("File too large: {size} bytes (max: {max})")]
    SizeExceeded { size: u64, max: u64 },

    #[error("Cannot open video file: {0}")]
    SourceOpenFailure(String),

    #[error("Video has no frames")]
    EmptySource,

    #[error("Frame extraction incomplete: got {got}, expected {expected}")]
    ExtractionIncomplete { got: usize, expected: usize },

    #[error("Model is not loaded. Please wait for initialization.")]
    ModelNotReady,

    #[error("Maximum {max} files allowed per batch, got {count}")]
    TooManyItems { count: usize, max: usize },

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(String),
}

impl From<image::ImageError> for RecognitionError {
    fn from(err: image::ImageError) -> Self {
        RecognitionError::Image(err.to_string())
    }
}

impl RecognitionError {
    /// Discriminator of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecognitionError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            RecognitionError::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            RecognitionError::SourceOpenFailure(_) => ErrorKind::SourceOpenFailure,
            RecognitionError::EmptySource => ErrorKind::EmptySource,
            RecognitionError::ExtractionIncomplete { .. } => ErrorKind::ExtractionIncomplete,
            RecognitionError::ModelNotReady => ErrorKind::ModelNotReady,
            RecognitionError::TooManyItems { .. } => ErrorKind::TooManyItems,
            RecognitionError::Unexpected(_)
            | RecognitionError::Io(_)
            | RecognitionError::Image(_) => ErrorKind::UnexpectedFailure,
        }
    }
}

/// Error kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    SizeExceeded,
    SourceOpenFailure,
    EmptySource,
    ExtractionIncomplete,
    ModelNotReady,
    TooManyItems,
    UnexpectedFailure,
}

/// Who is responsible for a failure, as seen by a caller of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The submitted input was malformed or out of bounds
    InvalidInput,
    /// The service cannot serve right now (model not loaded)
    Unavailable,
    /// Processing failed inside the service
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::UnsupportedFormat
            | ErrorKind::SizeExceeded
            | ErrorKind::SourceOpenFailure
            | ErrorKind::EmptySource
            | ErrorKind::TooManyItems => ErrorCategory::InvalidInput,
            ErrorKind::ModelNotReady => ErrorCategory::Unavailable,
            ErrorKind::ExtractionIncomplete | ErrorKind::UnexpectedFailure => {
                ErrorCategory::Internal
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UnsupportedFormat => write!(f, "unsupported_format"),
            ErrorKind::SizeExceeded => write!(f, "size_exceeded"),
            ErrorKind::SourceOpenFailure => write!(f, "source_open_failure"),
            ErrorKind::EmptySource => write!(f, "empty_source"),
            ErrorKind::ExtractionIncomplete => write!(f, "extraction_incomplete"),
            ErrorKind::ModelNotReady => write!(f, "model_not_ready"),
            ErrorKind::TooManyItems => write!(f, "too_many_items"),
            ErrorKind::UnexpectedFailure => write!(f, "unexpected_failure"),
        }
    }
}

/// Result type for recognition operations
pub type Result<T> = std::result::Result<T, RecognitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            RecognitionError::SizeExceeded { size: 2, max: 1 }.kind(),
            ErrorKind::SizeExceeded
        );
        assert_eq!(RecognitionError::EmptySource.kind(), ErrorKind::EmptySource);
        assert_eq!(
            RecognitionError::Io(std::io::Error::other("disk full")).kind(),
            ErrorKind::UnexpectedFailure
        );
        assert_eq!(
            RecognitionError::Image("bad buffer".to_string()).kind(),
            ErrorKind::UnexpectedFailure
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ErrorKind::UnsupportedFormat.category(),
            ErrorCategory::InvalidInput
        );
        assert_eq!(ErrorKind::TooManyItems.category(), ErrorCategory::InvalidInput);
        assert_eq!(ErrorKind::ModelNotReady.category(), ErrorCategory::Unavailable);
        assert_eq!(
            ErrorKind::ExtractionIncomplete.category(),
            ErrorCategory::Internal
        );
        assert_eq!(
            ErrorKind::UnexpectedFailure.category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_error_display() {
        let err = RecognitionError::ExtractionIncomplete {
            got: 15,
            expected: 16,
        };
        assert_eq!(
            err.to_string(),
            "Frame extraction incomplete: got 15, expected 16"
        );

        let err = RecognitionError::TooManyItems { count: 11, max: 10 };
        assert_eq!(err.to_string(), "Maximum 10 files allowed per batch, got 11");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let yaml = serde_yaml::to_string(&ErrorKind::ModelNotReady).unwrap();
        assert_eq!(yaml.trim(), "model_not_ready");
        assert_eq!(ErrorKind::ModelNotReady.to_string(), "model_not_ready");
    }
}
