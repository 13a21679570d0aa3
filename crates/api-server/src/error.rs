//! Mapping of recognition errors to HTTP responses

use crate::types::ErrorResponse;
use action_recognition_common::{ErrorCategory, ErrorKind, RecognitionError};
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    /// Recognition error kind; `None` for HTTP-level failures
    kind: Option<ErrorKind>,
    message: String,
}

impl ApiError {
    /// Request that is malformed at the HTTP level (missing field, bad multipart body)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for an error kind
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    if kind == ErrorKind::SizeExceeded {
        return StatusCode::PAYLOAD_TOO_LARGE;
    }
    match kind.category() {
        ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorCategory::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RecognitionError> for ApiError {
    fn from(err: RecognitionError) -> Self {
        let kind = err.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!("Request failed: {err}");
        }
        Self {
            status,
            kind: Some(kind),
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let kind =
            (err.status() == StatusCode::PAYLOAD_TOO_LARGE).then_some(ErrorKind::SizeExceeded);
        Self {
            status: err.status(),
            kind,
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
            kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}
