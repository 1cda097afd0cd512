//! One model round-trip: invoke, then decode into the stage's output type.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::llm_client::ModelInvoker;
use crate::pipeline::decoder::{decode, Validate};
use crate::pipeline::error::{PipelineError, Stage};
use crate::pipeline::prompts::StagePrompt;

pub async fn run_stage<T>(
    llm: &dyn ModelInvoker,
    timeout: Duration,
    stage: Stage,
    prompt: &StagePrompt,
) -> Result<T, PipelineError>
where
    T: DeserializeOwned + Validate,
{
    debug!("{stage}: prompt_len={}", prompt.user.len());
    let started = Instant::now();

    let raw = llm
        .invoke(&prompt.system, &prompt.user, timeout)
        .await
        .map_err(|e| PipelineError::new(stage, e))?;

    let output = decode::<T>(&raw).map_err(|e| PipelineError::new(stage, e))?;

    info!(
        "{stage} completed in {}ms (response_len={})",
        started.elapsed().as_millis(),
        raw.len()
    );
    Ok(output)
}
