//! API Server Binary Entry Point

use action_recognition_api_server::{start_server, ApiState};
use action_recognition_common::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "action_recognition_api_server=info,action_recognition_pipeline=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional YAML config, then ACTION_* environment overrides
    let config_path = std::env::var("ACTION_CONFIG").ok().map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    let addr = settings.bind_addr();

    // Model loading is blocking
    let state = tokio::task::spawn_blocking(move || ApiState::new(settings)).await?;

    tracing::info!("Starting {}", state.settings.app_name);
    start_server(&addr, state).await?;

    Ok(())
}
