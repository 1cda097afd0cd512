//! Skill taxonomy produced by the Extraction stage.

use serde::{Deserialize, Serialize};

use crate::pipeline::decoder::{SchemaViolation, Validate};

pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 10;

/// A single skill quoted from the job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSkill {
    pub name: String,
    /// Verbatim quote from the posting. May be empty on missing-skill entries.
    #[serde(default, alias = "source_context")]
    pub context: String,
    /// 1 – 10, where 10 is a hard requirement the posting repeats.
    pub importance: u8,
}

impl RawSkill {
    pub fn check(&self) -> Result<(), SchemaViolation> {
        if self.name.trim().is_empty() {
            return Err(SchemaViolation::new("skill with an empty name"));
        }
        if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&self.importance) {
            return Err(SchemaViolation::new(format!(
                "skill '{}' has importance {} outside {MIN_IMPORTANCE}..={MAX_IMPORTANCE}",
                self.name, self.importance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: String,
    /// Seniority level as written in the posting ("senior", "staff", ...).
    #[serde(default)]
    pub level: String,
}

/// Full structured output of the Extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSet {
    #[serde(rename = "required_skills")]
    pub required: Vec<RawSkill>,
    #[serde(rename = "nice_to_have_skills", default)]
    pub nice_to_have: Vec<RawSkill>,
    #[serde(rename = "company_info", default)]
    pub company: CompanyInfo,
}

impl SkillSet {
    pub fn all(&self) -> impl Iterator<Item = &RawSkill> {
        self.required.iter().chain(self.nice_to_have.iter())
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.required.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Validate for SkillSet {
    fn validate(&self) -> Result<(), SchemaViolation> {
        self.all().try_for_each(RawSkill::check)
    }
}
