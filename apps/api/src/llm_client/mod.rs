/// LLM Client: the single point of entry for all model calls in the tailoring pipeline.
///
/// ARCHITECTURAL RULE: No other module may call the model endpoint directly.
/// Stages depend on the `ModelInvoker` trait; `LlmClient` is the Gemini-backed implementation.
///
/// One call = one round-trip. No streaming, no retries: a failed call fails its stage.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(test)]
pub mod mock;
pub mod prompts;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("model returned no candidates or no content parts")]
    EmptyResponse,

    #[error("unexpected model response shape: {0}")]
    UnexpectedResponseShape(String),
}

/// Text-in/text-out contract every stage depends on.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Sends one prompt and returns the text of the first candidate's first part.
    /// An empty `system` is omitted from the request.
    async fn invoke(&self, system: &str, prompt: &str, timeout: Duration)
        -> Result<String, LlmError>;

    /// Model identifier, for logs and the health endpoint.
    fn model(&self) -> &str;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

impl GenerateContentResponse {
    /// Unwraps the first candidate's first part, which must be plain text.
    pub fn into_text(self) -> Result<String, LlmError> {
        let candidate = self.candidates.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let content = candidate.content.ok_or(LlmError::EmptyResponse)?;
        let first = content.parts.into_iter().next().ok_or(LlmError::EmptyResponse)?;

        match first.get("text").and_then(|t| t.as_str()) {
            Some(text) => Ok(text.to_string()),
            None => {
                let kind = first
                    .as_object()
                    .and_then(|o| o.keys().next().cloned())
                    .unwrap_or_else(|| "non-object".to_string());
                Err(LlmError::UnexpectedResponseShape(format!(
                    "first content part is '{kind}', not text"
                )))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The Gemini-backed model invoker. Cheap to clone; holds no per-call state.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    pub fn new(
        api_key: String,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn send(
        &self,
        system: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<GenerateContentResponse, LlmError> {
        let body = GenerateContentRequest {
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![TextPart { text: system }],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![TextPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| LlmError::UnexpectedResponseShape(format!("response body: {e}")))
    }
}

#[async_trait]
impl ModelInvoker for LlmClient {
    async fn invoke(
        &self,
        system: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, LlmError> {
        debug!(
            "Sending prompt to {} (system_len={}, prompt_len={})",
            self.model,
            system.len(),
            prompt.len()
        );
        let started = Instant::now();

        let response = tokio::time::timeout(timeout, self.send(system, prompt, timeout))
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;

        let usage = response.usage_metadata.as_ref();
        info!(
            model = %self.model,
            input_tokens = usage.and_then(|u| u.prompt_token_count),
            output_tokens = usage.and_then(|u| u.candidates_token_count),
            total_tokens = usage.and_then(|u| u.total_token_count),
            latency_ms = started.elapsed().as_millis() as u64,
            "LLM API call"
        );

        if let Some(reason) = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|r| *r != "STOP")
        {
            warn!("LLM candidate finished with reason {reason}");
        }

        response.into_text()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        // Strip the URL so error text stays free of request details.
        LlmError::Unavailable(error.without_url().to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::Unavailable(format!("authentication rejected (status {status}): {message}"))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            LlmError::Unavailable(format!("upstream timeout (status {status}): {message}"))
        }
        _ => LlmError::Unavailable(format!("status {status}: {message}")),
    }
}
