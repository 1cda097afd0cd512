//! Extraction stage: job-posting markup → `SkillSet`.

use std::time::Duration;

use tracing::{info, warn};

use crate::llm_client::ModelInvoker;
use crate::models::skills::SkillSet;
use crate::pipeline::cleaner::clean_markup;
use crate::pipeline::error::{PipelineError, Stage};
use crate::pipeline::prompts::build_extraction_prompt;
use crate::pipeline::stage::run_stage;

/// Cleans the posting and asks the model for its skill taxonomy.
///
/// Blank postings are still sent; an empty `required_skills` list is a valid answer.
pub async fn extract_skills(
    llm: &dyn ModelInvoker,
    timeout: Duration,
    job_markup: &str,
) -> Result<SkillSet, PipelineError> {
    let job_text = clean_markup(job_markup);
    if job_text.is_empty() {
        warn!("Job posting is empty after cleaning");
    }

    let prompt = build_extraction_prompt(&job_text);
    let skills: SkillSet = run_stage(llm, timeout, Stage::Extraction, &prompt).await?;

    info!(
        "Extracted {} required and {} nice-to-have skills for '{}'",
        skills.required.len(),
        skills.nice_to_have.len(),
        skills.company.position
    );
    Ok(skills)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::mock::MockInvoker;
    use crate::llm_client::LlmError;

    const TIMEOUT: Duration = Duration::from_secs(5);

    const SKILLS_JSON: &str = r#"{
        "required_skills": [
            {"name": "Go", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 9},
            {"name": "Kubernetes", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 9}
        ],
        "nice_to_have_skills": [],
        "company_info": {"name": "Acme", "position": "Platform Engineer", "level": "senior"}
    }"#;

    #[tokio::test]
    async fn test_extracts_from_cleaned_markup() {
        let mock = MockInvoker::new();
        mock.push_text(format!("```json\n{SKILLS_JSON}\n```"));

        let skills = extract_skills(
            &mock,
            TIMEOUT,
            "<html><body><script>x()</script><p>Requires: Go, Kubernetes, 5+ years</p></body></html>",
        )
        .await
        .unwrap();

        assert_eq!(skills.required_names(), vec!["Go", "Kubernetes"]);
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Requires: Go, Kubernetes, 5+ years"));
        assert!(!calls[0].prompt.contains("x()"));
        assert_eq!(calls[0].timeout, TIMEOUT);
    }

    #[tokio::test]
    async fn test_empty_required_list_is_valid() {
        let mock = MockInvoker::new();
        mock.push_text(r#"{"required_skills": []}"#);

        let skills = extract_skills(&mock, TIMEOUT, "").await.unwrap();
        assert!(skills.required.is_empty());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_importance_is_schema_failure() {
        let mock = MockInvoker::new();
        mock.push_text(r#"{"required_skills": [{"name": "Go", "context": "", "importance": 11}]}"#);

        let err = extract_skills(&mock, TIMEOUT, "Go").await.unwrap_err();
        assert_eq!(err.stage, Stage::Extraction);
        assert_eq!(err.kind(), "SchemaDecodeFailure");
    }

    #[tokio::test]
    async fn test_model_failure_is_tagged_with_extraction() {
        let mock = MockInvoker::new();
        mock.push_error(LlmError::EmptyResponse);

        let err = extract_skills(&mock, TIMEOUT, "Go").await.unwrap_err();
        assert_eq!(err.stage, Stage::Extraction);
        assert_eq!(err.kind(), "EmptyModelResponse");
    }
}
