//! Schema Decoder: turns model text into a typed, validated stage output.
//!
//! Policy: decode the trimmed text as-is; if that fails, strip code fences and decode once
//! more. There is no other repair. Failures carry a preview of the offending text.

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::pipeline::cleaner::clean_model_output;

/// Characters of offending model output kept in a decode error.
pub const PREVIEW_CHARS: usize = 200;

/// A structurally valid value that breaks a domain rule (range, uniqueness, ...).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct SchemaViolation(String);

impl SchemaViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Domain checks run after a successful structural decode.
pub trait Validate {
    fn validate(&self) -> Result<(), SchemaViolation>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), SchemaViolation> {
        self.iter().try_for_each(|item| item.validate())
    }
}

#[derive(Debug, Error)]
#[error("{reason} (response preview: {preview:?})")]
pub struct DecodeError {
    pub reason: String,
    pub preview: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>, text: &str) -> Self {
        Self {
            reason: reason.into(),
            preview: preview(text),
        }
    }
}

/// Decodes model output into `T` and validates it.
pub fn decode<T>(raw: &str) -> Result<T, DecodeError>
where
    T: DeserializeOwned + Validate,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::new("model output is empty", raw));
    }

    let value: T = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(first) => {
            let cleaned = clean_model_output(trimmed);
            if cleaned == trimmed {
                warn!("JSON parsing failed: {first}; preview={:?}", preview(trimmed));
                return Err(DecodeError::new(format!("invalid JSON: {first}"), trimmed));
            }
            serde_json::from_str(cleaned).map_err(|e| {
                warn!("JSON parsing failed after fence stripping: {e}; preview={:?}", preview(cleaned));
                DecodeError::new(format!("invalid JSON: {e}"), cleaned)
            })?
        }
    };

    value.validate().map_err(|violation| {
        warn!("Schema violation: {violation}");
        DecodeError::new(format!("schema violation: {violation}"), trimmed)
    })?;

    Ok(value)
}

/// First `PREVIEW_CHARS` characters, cut on a char boundary.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
