//! Axum route handler for rendering a tailored resume.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::resume::TransformedSection;
use crate::render::{substitute_sections, RenderMeta};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    /// Master resume as a RenderCV YAML document.
    pub resume_yaml: String,
    pub company: String,
    #[serde(default)]
    pub position: String,
    pub sections: Vec<TransformedSection>,
}

/// POST /api/v1/render
///
/// Writes transformed bullets into the master resume and returns the rendered PDF.
pub async fn handle_render(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Response, AppError> {
    if request.company.trim().is_empty() {
        return Err(AppError::Validation("company cannot be empty".to_string()));
    }

    let mut document: serde_yaml::Value = serde_yaml::from_str(&request.resume_yaml)
        .map_err(|e| AppError::Validation(format!("resume_yaml is not valid YAML: {e}")))?;

    let substitution = substitute_sections(&mut document, &request.sections);
    if !substitution.unmatched.is_empty() {
        return Err(AppError::Validation(format!(
            "sections not found in resume: {}",
            substitution.unmatched.join(", ")
        )));
    }
    info!("Substituted {} sections", substitution.replaced.len());

    let meta = RenderMeta {
        candidate: state.config.candidate_name.clone(),
        company: request.company,
        position: request.position,
    };
    let path = state.renderer.render(&document, &meta).await?;
    let pdf = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Render(e.into()))?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resume.pdf".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}
