//! API response types

use action_recognition_common::ErrorKind;
use serde::{Deserialize, Serialize};

/// Service description returned at the root path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub health: String,
    pub endpoints: EndpointMap,
}

/// Paths of the versioned API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMap {
    pub predict: String,
    pub batch_predict: String,
    pub classes: String,
    pub model_info: String,
    pub health: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when the model is loaded, `degraded` otherwise
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    /// Present when the failure maps to a recognition error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}
