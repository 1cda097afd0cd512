//! Scoring stage: `SkillSet` + resume → `ScoredResume`.

use std::time::Duration;

use tracing::info;

use crate::llm_client::ModelInvoker;
use crate::models::resume::{ResumeInput, ScoredResume};
use crate::models::skills::SkillSet;
use crate::pipeline::error::{PipelineError, Stage, StageFailure};
use crate::pipeline::prompts::build_scoring_prompt;
use crate::pipeline::stage::run_stage;

pub async fn score_resume(
    llm: &dyn ModelInvoker,
    timeout: Duration,
    skills: &SkillSet,
    resume: &ResumeInput,
) -> Result<ScoredResume, PipelineError> {
    let prompt = build_scoring_prompt(skills, resume)
        .map_err(|e| PipelineError::new(Stage::Scoring, StageFailure::Prompt(e.to_string())))?;

    let mut scored: ScoredResume = run_stage(llm, timeout, Stage::Scoring, &prompt).await?;

    if let ResumeInput::Sections(_) = resume {
        anchor_to_source(&mut scored, resume)
            .map_err(|failure| PipelineError::new(Stage::Scoring, failure))?;
    }

    info!(
        "Scored {} sections, overall {:.1}",
        scored.sections.len(),
        scored.overall_score
    );
    Ok(scored)
}

/// Rejects sections the model invented or left out and restores the caller's bullets verbatim.
fn anchor_to_source(scored: &mut ScoredResume, resume: &ResumeInput) -> Result<(), StageFailure> {
    let names = resume.section_names().unwrap_or_default();

    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| scored.section(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(StageFailure::SectionIdentityMismatch(format!(
            "model did not score section(s) '{}'",
            missing.join("', '")
        )));
    }

    let known = names.join("', '");
    for section in &mut scored.sections {
        let source = resume.find_section(&section.name).ok_or_else(|| {
            StageFailure::SectionIdentityMismatch(format!(
                "model returned section '{}' which is not in the resume (expected one of '{known}')",
                section.name
            ))
        })?;
        section.original_content = source.content();
    }
    Ok(())
}
