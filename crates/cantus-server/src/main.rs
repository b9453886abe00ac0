//! Cantus Server - HTTP front-end for speech synthesis and music generation

use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod settings;
mod state;

use cantus_core::{Capabilities, PythonBridge};
use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cantus_server=debug,cantus_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cantus server");

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    info!(
        "Writing audio to {:?}",
        settings
            .studio
            .output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    );

    // Probe the model backend once; the flags stay fixed for the process
    let bridge = Arc::new(PythonBridge::from_config(&settings.studio));
    let capabilities = tokio::task::spawn_blocking({
        let bridge = bridge.clone();
        move || Capabilities::detect(bridge.as_ref())
    })
    .await?;

    let state = AppState::new(
        settings.studio.clone(),
        capabilities,
        bridge.clone(),
        bridge,
    )
    .with_output_limit(settings.server.max_outputs);

    let mut app = api::create_router(state).layer(TraceLayer::new_for_http());
    if settings.server.cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
