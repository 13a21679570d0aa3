//! REST API server for action recognition
//!
//! Thin HTTP boundary over the recognition pipeline. Uploads arrive as multipart
//! bodies; the CPU-bound pipeline runs on the blocking thread pool.

mod error;
mod handlers;
mod types;

use action_recognition_classifier::Classifier;
use action_recognition_common::Settings;
use action_recognition_pipeline::{BatchCoordinator, PipelineRunner};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::{status_for, ApiError};
pub use handlers::*;
pub use types::*;

/// Mount point of the versioned API
pub const API_PREFIX: &str = "/api/v1";

/// Multipart framing allowance on top of the file payloads
const BODY_OVERHEAD: usize = 1024 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<Settings>,
    /// Single-video pipeline
    pub runner: Arc<PipelineRunner>,
    /// Batch front end over the same runner
    pub coordinator: Arc<BatchCoordinator>,
}

impl ApiState {
    /// Load the model and build the FFmpeg-backed pipeline
    ///
    /// A model that fails to load leaves the server in degraded mode.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let classifier = Arc::new(Classifier::load(&settings));
        let runner = PipelineRunner::from_settings(&settings, classifier);
        Self::with_runner(settings, runner)
    }

    /// State over an existing runner
    #[must_use]
    pub fn with_runner(settings: Settings, runner: PipelineRunner) -> Self {
        let runner = Arc::new(runner);
        let coordinator = Arc::new(BatchCoordinator::new(
            runner.clone(),
            settings.max_batch_items,
        ));
        Self {
            settings: Arc::new(settings),
            runner,
            coordinator,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    let body_limit = usize::try_from(state.settings.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_mul(state.settings.max_batch_items.max(1))
        .saturating_add(BODY_OVERHEAD);

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/model/info", get(model_info))
        .route("/classes", get(list_classes))
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest(API_PREFIX, api)
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings.cors_origins))
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
