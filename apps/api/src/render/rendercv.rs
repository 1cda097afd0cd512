//! `Renderer` backed by the `rendercv` command-line tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_yaml::Value;
use tokio::process::Command;
use tracing::{error, info};

use super::{slug, RenderError, RenderMeta, Renderer};

/// Directory rendercv writes into, relative to its working directory.
const RENDERCV_OUTPUT_DIR: &str = "rendercv_output";

#[derive(Debug, Clone)]
pub struct RenderCvRenderer {
    bin: String,
    output_dir: PathBuf,
}

impl RenderCvRenderer {
    pub fn new(bin: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            output_dir: output_dir.into(),
        }
    }

    fn final_path(&self, meta: &RenderMeta) -> PathBuf {
        let mut parts = vec![slug(&meta.candidate), slug(&meta.company)];
        if !meta.position.trim().is_empty() {
            parts.push(slug(&meta.position));
        }
        self.output_dir.join(format!("{}.pdf", parts.join("_")))
    }

    async fn run_rendercv(&self, work_dir: &Path, yaml_file: &str) -> Result<(), RenderError> {
        let output = Command::new(&self.bin)
            .arg("render")
            .arg(yaml_file)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        if !output.status.success() {
            let combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            error!("rendercv command failed: status={}, output={combined}", output.status);
            return Err(RenderError::CommandFailed {
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Renderer for RenderCvRenderer {
    async fn render(&self, document: &Value, meta: &RenderMeta) -> Result<PathBuf, RenderError> {
        info!(
            "Rendering resume for company={}, position={}",
            meta.company, meta.position
        );

        let work_dir = tempfile::tempdir()?;
        let stem = format!("{}_CV", slug(&meta.candidate));
        let yaml_file = format!("{stem}.yaml");

        let yaml = serde_yaml::to_string(document)?;
        tokio::fs::write(work_dir.path().join(&yaml_file), yaml).await?;

        self.run_rendercv(work_dir.path(), &yaml_file).await?;

        let produced = work_dir
            .path()
            .join(RENDERCV_OUTPUT_DIR)
            .join(format!("{stem}.pdf"));
        if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            error!("Expected PDF not found at {}", produced.display());
            return Err(RenderError::MissingOutput(produced));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let destination = self.final_path(meta);
        tokio::fs::copy(&produced, &destination).await?;

        info!("Rendered PDF written to {}", destination.display());
        Ok(destination)
    }
}
