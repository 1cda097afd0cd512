mod config;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod render;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::StageSequencer;
use crate::render::RenderCvRenderer;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(
        config.gemini_api_key.clone(),
        config.llm_api_base.clone(),
        config.llm_model.clone(),
    )
    .context("Failed to build HTTP client for the model API")?;
    info!(
        "LLM client initialized (model: {}, timeout: {}s)",
        config.llm_model,
        config.llm_timeout.as_secs()
    );

    let pipeline = StageSequencer::new(Arc::new(llm), config.llm_timeout);

    // Initialize renderer (rendercv CLI)
    let renderer = Arc::new(RenderCvRenderer::new(
        config.rendercv_bin.clone(),
        config.render_output_dir.clone(),
    ));
    info!(
        "Renderer: {} -> {}",
        config.rendercv_bin, config.render_output_dir
    );

    // Build app state
    let state = AppState {
        pipeline,
        renderer,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
