//! Stage-tagged failures of one pipeline run.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::pipeline::decoder::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Extraction,
    Scoring,
    Transformation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extraction => "Extraction",
            Stage::Scoring => "Scoring",
            Stage::Transformation => "Transformation",
        };
        f.write_str(name)
    }
}

/// Why a stage failed. Every variant is fatal to the run.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("schema decode failure: {0}")]
    SchemaDecode(#[from] DecodeError),

    #[error("section identity mismatch: {0}")]
    SectionIdentityMismatch(String),

    #[error("prompt construction failed: {0}")]
    Prompt(String),
}

impl StageFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            StageFailure::Model(LlmError::Unavailable(_)) => "ModelUnavailable",
            StageFailure::Model(LlmError::Timeout(_)) => "ModelTimeout",
            StageFailure::Model(LlmError::EmptyResponse) => "EmptyModelResponse",
            StageFailure::Model(LlmError::UnexpectedResponseShape(_)) => {
                "UnexpectedModelResponseShape"
            }
            StageFailure::SchemaDecode(_) => "SchemaDecodeFailure",
            StageFailure::SectionIdentityMismatch(_) => "SectionIdentityMismatch",
            StageFailure::Prompt(_) => "PromptConstructionFailure",
        }
    }
}

/// The single structured error a run surfaces to its caller.
#[derive(Debug, Error)]
#[error("stage={stage} {}: {failure}", .failure.kind())]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub failure: StageFailure,
}

impl PipelineError {
    pub fn new(stage: Stage, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.failure.kind()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.failure, StageFailure::Model(LlmError::Timeout(_)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_display_is_tagged_with_stage_and_kind() {
        let err = PipelineError::new(Stage::Scoring, LlmError::Timeout(Duration::from_secs(30)));
        assert_eq!(err.kind(), "ModelTimeout");
        assert!(err.is_timeout());
        let text = err.to_string();
        assert!(text.starts_with("stage=Scoring ModelTimeout"), "{text}");
        assert!(text.contains("30s"));
    }

    #[test]
    fn test_kinds_cover_the_taxonomy() {
        let cases = [
            (StageFailure::from(LlmError::Unavailable("down".into())), "ModelUnavailable"),
            (StageFailure::from(LlmError::EmptyResponse), "EmptyModelResponse"),
            (
                StageFailure::from(LlmError::UnexpectedResponseShape("x".into())),
                "UnexpectedModelResponseShape",
            ),
            (
                StageFailure::SectionIdentityMismatch("Acme".into()),
                "SectionIdentityMismatch",
            ),
            (StageFailure::Prompt("bad".into()), "PromptConstructionFailure"),
        ];
        for (failure, kind) in cases {
            assert_eq!(failure.kind(), kind);
        }
    }

    #[test]
    fn test_stage_serializes_as_name() {
        assert_eq!(
            serde_json::to_string(&Stage::Transformation).unwrap(),
            "\"Transformation\""
        );
    }
}
