use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TIMEOUT};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub llm_model: String,
    pub llm_api_base: String,
    pub llm_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
    pub rendercv_bin: String,
    pub render_output_dir: String,
    pub candidate_name: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &"<redacted>")
            .field("llm_model", &self.llm_model)
            .field("llm_api_base", &self.llm_api_base)
            .field("llm_timeout", &self.llm_timeout)
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("rendercv_bin", &self.rendercv_bin)
            .field("render_output_dir", &self.render_output_dir)
            .field("candidate_name", &self.candidate_name)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            gemini_api_key: lookup("GEMINI_API_KEY")
                .filter(|v| !v.trim().is_empty())
                .context("Required environment variable 'GEMINI_API_KEY' is not set")?,
            llm_model: var("LLM_MODEL", DEFAULT_MODEL),
            llm_api_base: var("LLM_API_BASE", DEFAULT_API_BASE),
            llm_timeout: Duration::from_secs(
                var("LLM_TIMEOUT_SECS", &DEFAULT_TIMEOUT.as_secs().to_string())
                    .parse::<u64>()
                    .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            port: var("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG", "info"),
            rendercv_bin: var("RENDERCV_BIN", "rendercv"),
            render_output_dir: var("RENDER_OUTPUT_DIR", "rendered"),
            candidate_name: var("CANDIDATE_NAME", "Candidate"),
        })
    }
}
