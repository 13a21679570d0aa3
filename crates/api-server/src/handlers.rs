//! HTTP request handlers for API endpoints

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

use crate::{
    error::ApiError,
    types::{EndpointMap, HealthResponse, RootResponse},
    ApiState, API_PREFIX,
};
use action_recognition_common::RecognitionError;
use action_recognition_pipeline::VideoUpload;

/// Default filename for an upload that carries none
const DEFAULT_FILENAME: &str = "video.mp4";

/// Service name, version and endpoint directory
pub async fn root(State(state): State<ApiState>) -> impl IntoResponse {
    let path = |suffix: &str| format!("{API_PREFIX}{suffix}");
    Json(RootResponse {
        name: state.settings.app_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: env!("CARGO_PKG_DESCRIPTION").to_string(),
        health: path("/health"),
        endpoints: EndpointMap {
            predict: path("/predict"),
            batch_predict: path("/predict/batch"),
            classes: path("/classes"),
            model_info: path("/model/info"),
            health: path("/health"),
        },
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let model_loaded = state.runner.classifier().is_ready();
    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
        model_loaded,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Model description
pub async fn model_info(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.runner.classifier().info())
}

/// Recognizable action labels
pub async fn list_classes(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.runner.classifier().labels().to_vec())
}

/// Classify one uploaded video (multipart field `file`)
pub async fn predict(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut uploads = read_uploads(multipart, "file").await?;
    if uploads.len() != 1 {
        return Err(ApiError::bad_request(format!(
            "Expected exactly one 'file' field, got {}",
            uploads.len()
        )));
    }
    let upload = uploads.remove(0);
    info!(
        "Prediction request: {} ({} bytes)",
        upload.filename,
        upload.data.len()
    );

    let runner = state.runner.clone();
    let prediction = tokio::task::spawn_blocking(move || runner.run_isolated(&upload))
        .await
        .map_err(|e| RecognitionError::Unexpected(format!("Worker task failed: {e}")))??;

    Ok(Json(prediction))
}

/// Classify several uploaded videos (multipart fields `files`)
pub async fn predict_batch(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    if !state.runner.classifier().is_ready() {
        return Err(RecognitionError::ModelNotReady.into());
    }

    let uploads = read_uploads(multipart, "files").await?;
    if uploads.is_empty() {
        return Err(ApiError::bad_request("No files to process"));
    }
    info!("Batch prediction request: {} files", uploads.len());

    let coordinator = state.coordinator.clone();
    let outcome = tokio::task::spawn_blocking(move || coordinator.run_batch(&uploads))
        .await
        .map_err(|e| RecognitionError::Unexpected(format!("Worker task failed: {e}")))??;

    Ok(Json(outcome))
}

/// Collect every multipart field named `field_name`; other fields are ignored
async fn read_uploads(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<Vec<VideoUpload>, ApiError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            warn!("Ignoring multipart field {:?}", field.name());
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let data = field.bytes().await?;
        uploads.push(VideoUpload::new(filename, data.to_vec()));
    }
    Ok(uploads)
}
