//! Stage Sequencer: drives Extraction → Scoring → Transformation for one run.
//!
//! Each `run` owns a fresh `PipelineRun`; the sequencer itself holds only the model handle
//! and timeout, so one instance serves concurrent runs.
//!
//! State machine:
//!   Idle → Extracting → Scoring → Transforming → Done
//!                  ↘         ↘            ↘
//!                   Failed(stage) on the first stage failure

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm_client::ModelInvoker;
use crate::models::resume::{ResumeInput, ResumeSection, ScoredResume, TransformedSection};
use crate::models::skills::SkillSet;
use crate::pipeline::error::{PipelineError, Stage, StageFailure};
use crate::pipeline::extraction::extract_skills;
use crate::pipeline::scoring::score_resume;
use crate::pipeline::transformation::transform_section;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Extracting,
    Scoring,
    Transforming,
    Done,
    Failed(Stage),
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed(_))
    }
}

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    state: RunState,
    history: Vec<RunState>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn advance(&mut self, next: RunState) {
        debug!(run_id = %self.run_id, "{:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        self.advance(RunState::Failed(error.stage));
        warn!(run_id = %self.run_id, "Pipeline run failed: {error}");
        error
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TailorRequest {
    pub job_html: String,
    pub resume: ResumeInput,
    /// Restricts Transformation to these sections. `None` transforms all of them.
    #[serde(default)]
    pub sections: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailorOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub skills: SkillSet,
    pub scored: ScoredResume,
    pub transformed: Vec<TransformedSection>,
}

#[derive(Clone)]
pub struct StageSequencer {
    llm: Arc<dyn ModelInvoker>,
    timeout: Duration,
}

impl StageSequencer {
    pub fn new(llm: Arc<dyn ModelInvoker>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Extraction only.
    pub async fn extract(&self, job_html: &str) -> Result<SkillSet, PipelineError> {
        extract_skills(self.llm.as_ref(), self.timeout, job_html).await
    }

    /// Scoring only, against an already extracted skill set.
    pub async fn score(
        &self,
        skills: &SkillSet,
        resume: &ResumeInput,
    ) -> Result<ScoredResume, PipelineError> {
        score_resume(self.llm.as_ref(), self.timeout, skills, resume).await
    }

    /// Transformation of a single section.
    pub async fn transform(
        &self,
        section: &ResumeSection,
        skills: Option<&SkillSet>,
    ) -> Result<TransformedSection, PipelineError> {
        transform_section(self.llm.as_ref(), self.timeout, section, skills).await
    }

    /// Runs the full pipeline with a fresh run record.
    pub async fn run(&self, request: TailorRequest) -> Result<TailorOutcome, PipelineError> {
        let mut run = PipelineRun::new();
        self.drive(&mut run, request).await
    }

    /// Runs the full pipeline, recording every transition on `run`.
    pub async fn drive(
        &self,
        run: &mut PipelineRun,
        request: TailorRequest,
    ) -> Result<TailorOutcome, PipelineError> {
        info!(run_id = %run.run_id, "Starting tailoring run");

        run.advance(RunState::Extracting);
        let skills = match self.extract(&request.job_html).await {
            Ok(skills) => skills,
            Err(e) => return Err(run.fail(e)),
        };

        run.advance(RunState::Scoring);
        let scored = match self.score(&skills, &request.resume).await {
            Ok(scored) => scored,
            Err(e) => return Err(run.fail(e)),
        };

        run.advance(RunState::Transforming);
        let targets = match select_sections(&scored, request.sections.as_deref()) {
            Ok(targets) => targets,
            Err(e) => return Err(run.fail(e)),
        };

        let mut transformed = Vec::with_capacity(targets.len());
        for section in targets {
            match self.transform(section, Some(&skills)).await {
                Ok(section) => transformed.push(section),
                Err(e) => return Err(run.fail(e)),
            }
        }

        run.advance(RunState::Done);
        info!(
            run_id = %run.run_id,
            "Tailoring run finished: {} sections scored, {} transformed",
            scored.sections.len(),
            transformed.len()
        );

        Ok(TailorOutcome {
            run_id: run.run_id,
            started_at: run.started_at,
            skills,
            scored,
            transformed,
        })
    }
}

/// Sections to transform, in ScoredResume order.
fn select_sections<'a>(
    scored: &'a ScoredResume,
    requested: Option<&[String]>,
) -> Result<Vec<&'a ResumeSection>, PipelineError> {
    let Some(requested) = requested else {
        return Ok(scored.sections.iter().collect());
    };

    if let Some(unknown) = requested.iter().find(|name| scored.section(name).is_none()) {
        return Err(PipelineError::new(
            Stage::Transformation,
            StageFailure::SectionIdentityMismatch(format!(
                "requested section '{unknown}' was not scored"
            )),
        ));
    }

    Ok(scored
        .sections
        .iter()
        .filter(|s| requested.contains(&s.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::llm_client::mock::MockInvoker;
    use crate::llm_client::LlmError;
    use crate::models::resume::SourceSection;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn skills_json() -> String {
        json!({
            "required_skills": [
                {"name": "Go", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 9},
                {"name": "Kubernetes", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 8}
            ],
            "nice_to_have_skills": [],
            "company_info": {"name": "Acme", "position": "Platform Engineer", "level": "senior"}
        })
        .to_string()
    }

    fn scored_json() -> String {
        json!({
            "overall_score": 4.0,
            "overall_comments": "Python background, no Go or Kubernetes",
            "sections": [{
                "name": "Acme-Engineer",
                "original_content": "Built internal tools in Python",
                "score": 4.0,
                "score_reasoning": "Tooling experience but no Go or Kubernetes",
                "missing_skills": [
                    {"name": "Go", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 9},
                    {"name": "Kubernetes", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 8}
                ]
            }]
        })
        .to_string()
    }

    fn transformed_json() -> String {
        json!({
            "name": "Acme-Engineer",
            "items": [{
                "original_bullet": "Built internal tools in Python",
                "transformed_bullet": "Built internal Go tools on Kubernetes",
                "char_count_original": 30,
                "char_count_new": 37,
                "original_skills": ["Python"],
                "added_skills": ["Go", "Kubernetes"],
                "original_score": 4,
                "new_score": 8
            }],
            "improvement_explanation": "Reframes tooling work around Go and Kubernetes"
        })
        .to_string()
    }

    fn request(sections: Option<Vec<String>>) -> TailorRequest {
        TailorRequest {
            job_html: "<p>Requires: Go, Kubernetes, 5+ years</p>".to_string(),
            resume: ResumeInput::Sections(vec![SourceSection {
                name: "Acme-Engineer".to_string(),
                bullets: vec!["Built internal tools in Python".to_string()],
            }]),
            sections,
        }
    }

    #[tokio::test]
    async fn test_full_run_reaches_done() {
        let mock = Arc::new(MockInvoker::new());
        mock.push_text(skills_json());
        mock.push_text(format!("```json\n{}\n```", scored_json()));
        mock.push_text(transformed_json());

        let sequencer = StageSequencer::new(mock.clone(), TIMEOUT);
        let mut run = PipelineRun::new();
        let outcome = sequencer.drive(&mut run, request(None)).await.unwrap();

        assert_eq!(run.state(), RunState::Done);
        assert_eq!(
            run.history(),
            &[
                RunState::Idle,
                RunState::Extracting,
                RunState::Scoring,
                RunState::Transforming,
                RunState::Done
            ]
        );
        assert_eq!(outcome.run_id, run.run_id);
        assert_eq!(outcome.skills.required_names(), vec!["Go", "Kubernetes"]);

        let section = outcome.scored.section("Acme-Engineer").unwrap();
        let missing: Vec<&str> = section.missing_skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(missing, vec!["Go", "Kubernetes"]);

        let item = &outcome.transformed[0].items[0];
        assert_eq!(item.char_count_original, 30);
        assert_eq!(item.char_count_new, 37);
        assert!(item.added_skills.contains("Go"));
        assert!(item.added_skills.contains("Kubernetes"));
        assert!(item.within_char_budget());
        assert!(item.transformed_bullet.contains("Go"));

        assert_eq!(mock.call_count(), 3);
        assert!(mock.calls().iter().all(|c| c.timeout == TIMEOUT));
    }

    #[tokio::test]
    async fn test_scoring_timeout_fails_run_at_scoring() {
        let mock = Arc::new(MockInvoker::new());
        mock.push_text(skills_json());
        mock.push_error(LlmError::Timeout(TIMEOUT));
        mock.push_text(transformed_json());

        let sequencer = StageSequencer::new(mock.clone(), TIMEOUT);
        let mut run = PipelineRun::new();
        let err = sequencer.drive(&mut run, request(None)).await.unwrap_err();

        assert_eq!(err.stage, Stage::Scoring);
        assert_eq!(err.kind(), "ModelTimeout");
        assert!(err.is_timeout());
        assert_eq!(run.state(), RunState::Failed(Stage::Scoring));
        assert!(run.state().is_terminal());
        assert!(!run.history().contains(&RunState::Transforming));
        assert_eq!(mock.call_count(), 2, "transformation must not be invoked");
        assert_eq!(mock.remaining(), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_stops_before_scoring() {
        let mock = Arc::new(MockInvoker::new());
        mock.push_text("I'm sorry, I can't do that.");

        let sequencer = StageSequencer::new(mock.clone(), TIMEOUT);
        let err = sequencer.run(request(None)).await.unwrap_err();

        assert_eq!(err.stage, Stage::Extraction);
        assert_eq!(err.kind(), "SchemaDecodeFailure");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_requested_section_fails_transformation() {
        let mock = Arc::new(MockInvoker::new());
        mock.push_text(skills_json());
        mock.push_text(scored_json());

        let sequencer = StageSequencer::new(mock.clone(), TIMEOUT);
        let mut run = PipelineRun::new();
        let err = sequencer
            .drive(&mut run, request(Some(vec!["Globex-Engineer".to_string()])))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Transformation);
        assert_eq!(err.kind(), "SectionIdentityMismatch");
        assert_eq!(run.state(), RunState::Failed(Stage::Transformation));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_restriction_transforms_nothing() {
        let mock = Arc::new(MockInvoker::new());
        mock.push_text(skills_json());
        mock.push_text(scored_json());

        let sequencer = StageSequencer::new(mock.clone(), TIMEOUT);
        let outcome = sequencer.run(request(Some(vec![]))).await.unwrap();

        assert!(outcome.transformed.is_empty());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_restricted_run_returns_one_item_per_bullet() {
        let bullets = [
            "Built internal tools in Python",
            "Ran the on-call rotation",
            "Mentored two junior engineers",
            "Cut CI time by 40%",
        ];
        let scored = json!({
            "overall_score": 5.0,
            "sections": [
                {"name": "Acme-Engineer", "original_content": "", "score": 4.0},
                {"name": "SideProject", "original_content": "", "score": 6.0}
            ]
        });
        let items: Vec<serde_json::Value> = bullets
            .iter()
            .map(|b| json!({"original_bullet": b, "transformed_bullet": format!("{b} in Go")}))
            .collect();

        let mock = Arc::new(MockInvoker::new());
        mock.push_text(skills_json());
        mock.push_text(scored.to_string());
        mock.push_text(json!({"name": "Acme-Engineer", "items": items}).to_string());

        let sequencer = StageSequencer::new(mock.clone(), TIMEOUT);
        let outcome = sequencer
            .run(TailorRequest {
                job_html: "Requires: Go".to_string(),
                resume: ResumeInput::Sections(vec![
                    SourceSection {
                        name: "Acme-Engineer".to_string(),
                        bullets: bullets.iter().map(|b| b.to_string()).collect(),
                    },
                    SourceSection {
                        name: "SideProject".to_string(),
                        bullets: vec!["Wrote a CLI".to_string()],
                    },
                ]),
                sections: Some(vec!["Acme-Engineer".to_string()]),
            })
            .await
            .unwrap();

        assert_eq!(outcome.transformed.len(), 1);
        assert_eq!(outcome.transformed[0].name, "Acme-Engineer");
        assert_eq!(outcome.transformed[0].items.len(), 4);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_runs_get_distinct_ids() {
        let a = PipelineRun::new();
        let b = PipelineRun::default();
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.state(), RunState::Idle);
    }
}
