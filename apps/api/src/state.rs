use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::StageSequencer;
use crate::render::Renderer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Runs the LLM stages. Holds the model client; no per-run state.
    pub pipeline: StageSequencer,
    /// Pluggable PDF renderer. Default: RenderCvRenderer.
    pub renderer: Arc<dyn Renderer>,
    pub config: Config,
}
