//! Rendering: turns a tailored RenderCV YAML resume into a PDF.
//!
//! The YAML document is the caller's master resume. Transformed sections are written back
//! into it by name before the renderer runs:
//!   - roles:    `cv.sections.<experience key>[]` named "<company>-<position>"
//!   - projects: `cv.sections.projects[]` named by `name`

pub mod handlers;
pub mod rendercv;

use std::path::PathBuf;

use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::models::resume::{SourceSection, TransformedSection};

pub use rendercv::RenderCvRenderer;

/// Section keys holding one entry per role.
const EXPERIENCE_KEYS: &[&str] = &["professional_experience", "experience", "work_experience"];

/// Section keys holding one entry per project.
const PROJECT_KEYS: &[&str] = &["projects"];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize resume YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("could not start '{bin}': {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}: {output}")]
    CommandFailed { status: String, output: String },

    #[error("expected PDF not found at {}", .0.display())]
    MissingOutput(PathBuf),
}

/// Naming inputs for the rendered file.
#[derive(Debug, Clone, Default)]
pub struct RenderMeta {
    pub candidate: String,
    pub company: String,
    pub position: String,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders `document` and returns the path of the produced PDF.
    async fn render(&self, document: &Value, meta: &RenderMeta) -> Result<PathBuf, RenderError>;
}

/// Outcome of writing transformed sections into a resume document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Substitution {
    pub replaced: Vec<String>,
    pub unmatched: Vec<String>,
}

/// Replaces the `highlights` of each entry whose name matches a transformed section.
pub fn substitute_sections(document: &mut Value, sections: &[TransformedSection]) -> Substitution {
    let mut result = Substitution::default();

    for section in sections {
        let bullets: Vec<Value> = section
            .transformed_bullets()
            .into_iter()
            .map(|b| Value::String(b.to_string()))
            .collect();

        let target = entries_mut(document)
            .into_iter()
            .find(|(name, _)| *name == section.name);

        match target {
            Some((_, entry)) => {
                entry.insert(Value::from("highlights"), Value::Sequence(bullets));
                result.replaced.push(section.name.clone());
            }
            None => result.unmatched.push(section.name.clone()),
        }
    }

    result
}

/// Roles and projects of a RenderCV document as named source sections.
pub fn sections_from_rendercv(document: &Value) -> Vec<SourceSection> {
    let Some(sections) = document.get("cv").and_then(|cv| cv.get("sections")) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (keys, is_role) in [(EXPERIENCE_KEYS, true), (PROJECT_KEYS, false)] {
        for key in keys {
            let Some(entries) = sections.get(*key).and_then(Value::as_sequence) else {
                continue;
            };
            for entry in entries.iter().filter_map(Value::as_mapping) {
                let Some(name) = entry_name(entry, is_role) else {
                    continue;
                };
                let bullets = entry
                    .get("highlights")
                    .and_then(Value::as_sequence)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                out.push(SourceSection { name, bullets });
            }
        }
    }
    out
}

fn entries_mut(document: &mut Value) -> Vec<(String, &mut Mapping)> {
    let Some(sections) = document
        .get_mut("cv")
        .and_then(|cv| cv.get_mut("sections"))
        .and_then(Value::as_mapping_mut)
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (key, entries) in sections.iter_mut() {
        let is_role = match key.as_str() {
            Some(k) if EXPERIENCE_KEYS.contains(&k) => true,
            Some(k) if PROJECT_KEYS.contains(&k) => false,
            _ => continue,
        };
        let Some(entries) = entries.as_sequence_mut() else {
            continue;
        };
        for entry in entries.iter_mut().filter_map(Value::as_mapping_mut) {
            if let Some(name) = entry_name(entry, is_role) {
                out.push((name, entry));
            }
        }
    }
    out
}

fn entry_name(entry: &Mapping, is_role: bool) -> Option<String> {
    let field = |key: &str| entry.get(key).and_then(Value::as_str).map(str::trim);
    if is_role {
        Some(format!("{}-{}", field("company")?, field("position")?))
    } else {
        field("name").map(str::to_string)
    }
}

/// File-name-safe form of a free-text label.
pub fn slug(text: &str) -> String {
    let slug: String = text
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug
    }
}
