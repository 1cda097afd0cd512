//! Transformation stage: one scored section → `TransformedSection`.
//!
//! The model must echo the section name and return one item per source bullet, in order.
//! Either mismatch fails the stage; nothing is coerced. Each item's `original_bullet`
//! is then replaced with the source bullet so counts never depend on the model's echo.

use std::time::Duration;

use tracing::{info, warn};

use crate::llm_client::ModelInvoker;
use crate::models::resume::{ResumeSection, TransformedSection};
use crate::models::skills::SkillSet;
use crate::pipeline::error::{PipelineError, Stage, StageFailure};
use crate::pipeline::prompts::build_transformation_prompt;
use crate::pipeline::stage::run_stage;

pub async fn transform_section(
    llm: &dyn ModelInvoker,
    timeout: Duration,
    section: &ResumeSection,
    skills: Option<&SkillSet>,
) -> Result<TransformedSection, PipelineError> {
    let fail = |failure: StageFailure| PipelineError::new(Stage::Transformation, failure);

    let prompt = build_transformation_prompt(section, skills)
        .map_err(|e| fail(StageFailure::Prompt(e.to_string())))?;

    let transformed: TransformedSection =
        run_stage(llm, timeout, Stage::Transformation, &prompt).await?;

    check_identity(section, &transformed).map_err(fail)?;

    let bullets = section.bullets();
    let transformed = TransformedSection {
        items: transformed
            .items
            .into_iter()
            .zip(bullets)
            .map(|(item, source)| item.anchored_to(source))
            .collect(),
        ..transformed
    };

    for (i, item) in transformed.items.iter().enumerate() {
        if !item.within_char_budget() {
            warn!(
                "Bullet {} of '{}' is outside the ±25% character budget ({} -> {})",
                i + 1,
                transformed.name,
                item.char_count_original,
                item.char_count_new
            );
        }
    }

    info!(
        "Transformed section '{}' ({} bullets)",
        transformed.name,
        transformed.items.len()
    );
    Ok(transformed)
}

fn check_identity(
    section: &ResumeSection,
    transformed: &TransformedSection,
) -> Result<(), StageFailure> {
    if transformed.name != section.name {
        return Err(StageFailure::SectionIdentityMismatch(format!(
            "expected section '{}', model returned '{}'",
            section.name, transformed.name
        )));
    }

    let expected = section.bullets().len();
    if transformed.items.len() != expected {
        return Err(StageFailure::SectionIdentityMismatch(format!(
            "section '{}' has {expected} bullets, model returned {} items",
            section.name,
            transformed.items.len()
        )));
    }
    Ok(())
}
