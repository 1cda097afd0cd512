//! Resume-side data flowing through Scoring and Transformation.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::skills::RawSkill;
use crate::pipeline::decoder::{SchemaViolation, Validate};

pub const MAX_SCORE: f32 = 10.0;

/// Allowed drift between original and rewritten bullet length (±25%).
pub const CHAR_BUDGET_TOLERANCE: f64 = 0.25;

// ────────────────────────────────────────────────────────────────────────────
// Input
// ────────────────────────────────────────────────────────────────────────────

/// A named section supplied by the caller (one role or one project).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSection {
    pub name: String,
    pub bullets: Vec<String>,
}

impl SourceSection {
    /// Bullets joined one per line. Line breaks inside a bullet become spaces so
    /// each bullet stays a single line.
    pub fn content(&self) -> String {
        self.bullets
            .iter()
            .map(|b| single_line(b))
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The candidate resume, either as free text or pre-split into named sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResumeInput {
    Text(String),
    Sections(Vec<SourceSection>),
}

impl ResumeInput {
    pub fn is_blank(&self) -> bool {
        match self {
            ResumeInput::Text(text) => text.trim().is_empty(),
            ResumeInput::Sections(sections) => sections.is_empty(),
        }
    }

    /// Section names the model must echo. `None` for free text.
    pub fn section_names(&self) -> Option<Vec<&str>> {
        match self {
            ResumeInput::Text(_) => None,
            ResumeInput::Sections(sections) => {
                Some(sections.iter().map(|s| s.name.as_str()).collect())
            }
        }
    }

    pub fn find_section(&self, name: &str) -> Option<&SourceSection> {
        match self {
            ResumeInput::Text(_) => None,
            ResumeInput::Sections(sections) => sections.iter().find(|s| s.name == name),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSection {
    pub name: String,
    /// Verbatim bullets, newline-joined.
    pub original_content: String,
    pub score: f32,
    #[serde(default)]
    pub score_reasoning: String,
    #[serde(default)]
    pub missing_skills: Vec<RawSkill>,
}

impl ResumeSection {
    pub fn bullets(&self) -> Vec<&str> {
        split_bullets(&self.original_content)
    }

    fn check(&self) -> Result<(), SchemaViolation> {
        if self.name.trim().is_empty() {
            return Err(SchemaViolation::new("section with an empty name"));
        }
        check_score(&format!("section '{}'", self.name), self.score)?;
        self.missing_skills.iter().try_for_each(RawSkill::check)
    }
}

/// Aggregate root of one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResume {
    pub sections: Vec<ResumeSection>,
    pub overall_score: f32,
    #[serde(default)]
    pub overall_comments: String,
}

impl ScoredResume {
    pub fn section(&self, name: &str) -> Option<&ResumeSection> {
        self.sections.iter().find(|s| s.name == name)
    }
}

impl Validate for ScoredResume {
    fn validate(&self) -> Result<(), SchemaViolation> {
        check_score("overall score", self.overall_score)?;

        let mut seen = HashSet::new();
        for section in &self.sections {
            section.check()?;
            if !seen.insert(section.name.as_str()) {
                return Err(SchemaViolation::new(format!(
                    "section name '{}' appears more than once",
                    section.name
                )));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transformation output
// ────────────────────────────────────────────────────────────────────────────

/// One rewritten bullet. Produced only by the Transformation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedItem {
    pub original_bullet: String,
    pub transformed_bullet: String,
    #[serde(default)]
    pub char_count_original: usize,
    #[serde(default)]
    pub char_count_new: usize,
    #[serde(default)]
    pub original_skills: BTreeSet<String>,
    #[serde(default)]
    pub added_skills: BTreeSet<String>,
    #[serde(default)]
    pub original_score: f32,
    #[serde(default)]
    pub new_score: f32,
}

impl TransformedItem {
    /// Replaces model-reported counts with counts of the actual texts.
    pub fn recount(mut self) -> Self {
        self.char_count_original = self.original_bullet.chars().count();
        self.char_count_new = self.transformed_bullet.chars().count();
        self
    }

    /// Replaces the echoed original with the source bullet, then recounts.
    pub fn anchored_to(mut self, source: &str) -> Self {
        self.original_bullet = source.to_string();
        self.recount()
    }

    pub fn within_char_budget(&self) -> bool {
        within_char_budget(self.char_count_original, self.char_count_new)
    }
}

/// Transformation result for one section, keyed by the section name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedSection {
    pub name: String,
    pub items: Vec<TransformedItem>,
    #[serde(default)]
    pub improvement_explanation: String,
}

impl TransformedSection {
    pub fn transformed_bullets(&self) -> Vec<&str> {
        self.items
            .iter()
            .map(|item| item.transformed_bullet.as_str())
            .collect()
    }
}

impl Validate for TransformedSection {
    fn validate(&self) -> Result<(), SchemaViolation> {
        for (i, item) in self.items.iter().enumerate() {
            if item.transformed_bullet.trim().is_empty() {
                return Err(SchemaViolation::new(format!(
                    "item {} of section '{}' has an empty transformed bullet",
                    i + 1,
                    self.name
                )));
            }
            check_score("original bullet score", item.original_score)?;
            check_score("new bullet score", item.new_score)?;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Splits section content into bullets: non-empty trimmed lines without list markers.
/// A marker counts only when whitespace follows it, so "-5% latency" keeps its sign.
pub fn split_bullets(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix(['-', '*', '•'])
                .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
                .map(str::trim_start)
                .unwrap_or(line)
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn within_char_budget(original: usize, new: usize) -> bool {
    if original == 0 {
        return new == 0;
    }
    let drift = (new as f64 - original as f64).abs() / original as f64;
    drift <= CHAR_BUDGET_TOLERANCE
}

fn check_score(what: &str, score: f32) -> Result<(), SchemaViolation> {
    if score.is_finite() && (0.0..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(SchemaViolation::new(format!(
            "{what} is {score}, expected 0..={MAX_SCORE}"
        )))
    }
}
