//! Axum route handlers for the tailoring pipeline and resume intake.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::resume::{ResumeInput, ResumeSection, ScoredResume, TransformedSection};
use crate::models::skills::SkillSet;
use crate::pipeline::sequencer::{TailorOutcome, TailorRequest};
use crate::render::sections_from_rendercv;
use crate::state::AppState;

/// Largest accepted resume upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// `resume` and `resume_yaml` are alternatives: exactly one must be set.
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub job_description: String,
    #[serde(default)]
    pub resume: Option<ResumeInput>,
    /// RenderCV document; its roles and projects become the resume sections.
    #[serde(default)]
    pub resume_yaml: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub skills: SkillSet,
    pub scored: ScoredResume,
}

#[derive(Debug, Deserialize)]
pub struct TransformSectionRequest {
    pub section: ResumeSection,
    #[serde(default)]
    pub skills: Option<SkillSet>,
}

#[derive(Debug, Deserialize)]
pub struct TailorHttpRequest {
    pub job_description: String,
    #[serde(default)]
    pub resume: Option<ResumeInput>,
    #[serde(default)]
    pub resume_yaml: Option<String>,
    #[serde(default)]
    pub sections: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub size_bytes: usize,
    pub text: String,
}

fn resolve_resume(
    resume: Option<ResumeInput>,
    resume_yaml: Option<String>,
) -> Result<ResumeInput, AppError> {
    let resume = match (resume, resume_yaml) {
        (Some(resume), None) => resume,
        (None, Some(yaml)) => {
            let document: serde_yaml::Value = serde_yaml::from_str(&yaml)
                .map_err(|e| AppError::Validation(format!("resume_yaml is not valid YAML: {e}")))?;
            ResumeInput::Sections(sections_from_rendercv(&document))
        }
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "provide either resume or resume_yaml, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(AppError::Validation("resume is required".to_string()))
        }
    };

    if resume.is_blank() {
        return Err(AppError::Validation("resume cannot be empty".to_string()));
    }
    Ok(resume)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/score
///
/// Extraction + Scoring. Returns the skill set and the scored resume.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("job_description cannot be empty".to_string()));
    }
    let resume = resolve_resume(request.resume, request.resume_yaml)?;

    let skills = state.pipeline.extract(&request.job_description).await?;
    let scored = state.pipeline.score(&skills, &resume).await?;

    Ok(Json(ScoreResponse { skills, scored }))
}

/// POST /api/v1/transform-section
///
/// Rewrites one previously scored section.
pub async fn handle_transform_section(
    State(state): State<AppState>,
    Json(request): Json<TransformSectionRequest>,
) -> Result<Json<TransformedSection>, AppError> {
    if request.section.name.trim().is_empty() {
        return Err(AppError::Validation("section.name cannot be empty".to_string()));
    }
    if request.section.bullets().is_empty() {
        return Err(AppError::Validation(
            "section.original_content has no bullets".to_string(),
        ));
    }

    let transformed = state
        .pipeline
        .transform(&request.section, request.skills.as_ref())
        .await?;

    Ok(Json(transformed))
}

/// POST /api/v1/tailor
///
/// Full run: Extraction → Scoring → Transformation.
pub async fn handle_tailor(
    State(state): State<AppState>,
    Json(request): Json<TailorHttpRequest>,
) -> Result<Json<TailorOutcome>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("job_description cannot be empty".to_string()));
    }
    let resume = resolve_resume(request.resume, request.resume_yaml)?;

    let outcome = state
        .pipeline
        .run(TailorRequest {
            job_html: request.job_description,
            resume,
            sections: request.sections,
        })
        .await?;

    Ok(Json(outcome))
}

/// POST /api/v1/resumes/upload
///
/// Accepts a PDF resume in multipart field `resume` and returns its text.
pub async fn handle_upload_resume(
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e.body_text())))?
    {
        if field.name() != Some("resume") {
            continue;
        }

        let filename = field.file_name().unwrap_or("resume.pdf").to_string();
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(AppError::Validation("Only PDF files are allowed".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e.body_text())))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(format!(
                "File exceeds the {} MiB limit",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }

        let size_bytes = bytes.len();
        let text = tokio::task::spawn_blocking(move || extract_pdf_text(bytes))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        info!("Resume uploaded: filename={filename}, size={size_bytes}");
        return Ok(Json(UploadResponse {
            filename,
            size_bytes,
            text,
        }));
    }

    Err(AppError::Validation("multipart field 'resume' is required".to_string()))
}

/// PDF text extraction is CPU-bound; callers run it on the blocking pool.
fn extract_pdf_text(pdf: Bytes) -> Result<String, AppError> {
    pdf_extract::extract_text_from_mem(&pdf)
        .map_err(|e| AppError::Validation(format!("Could not read PDF: {e}")))
}
