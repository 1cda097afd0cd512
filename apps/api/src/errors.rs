use std::any::Any;

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::pipeline::error::{PipelineError, StageFailure};
use crate::render::RenderError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(e) => match &e.failure {
                StageFailure::Model(LlmError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
                StageFailure::Model(LlmError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::Render(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error = match &self {
            AppError::NotFound(msg) => json!({"code": "NOT_FOUND", "message": msg}),
            AppError::Validation(msg) => json!({"code": "VALIDATION_ERROR", "message": msg}),
            AppError::Pipeline(e) => {
                tracing::error!("Pipeline error: {e}");
                json!({
                    "code": "PIPELINE_ERROR",
                    "message": e.to_string(),
                    "stage": e.stage,
                    "kind": e.kind(),
                })
            }
            AppError::Render(e) => {
                tracing::error!("Render error: {e}");
                json!({"code": "RENDER_ERROR", "message": "Resume rendering failed"})
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                json!({
                    "code": "INTERNAL_ERROR",
                    "message": "An internal server error occurred",
                })
            }
        };

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Largest error body `attach_request_id` will buffer and rewrite.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Turns a handler panic into the same JSON 500 an `AppError::Internal` produces.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": {
                "code": "INTERNAL_ERROR",
                "message": "An internal server error occurred",
            }
        })),
    )
        .into_response()
}

/// Copies the request's `x-request-id` into `error.request_id` of JSON error bodies.
pub async fn attach_request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let response = next.run(request).await;

    let is_error = response.status().is_client_error() || response.status().is_server_error();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    let Some(request_id) = request_id.filter(|_| is_error && is_json) else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_ERROR_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Could not buffer error body for request {request_id}: {e}");
            return parts.status.into_response();
        }
    };

    let mut value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    let Some(error) = value.get_mut("error").and_then(Value::as_object_mut) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    error.insert("request_id".to_string(), Value::String(request_id));

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(value.to_string()))
}
