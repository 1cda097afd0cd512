// LLM prompts for the three pipeline stages.
// Reuses cross-cutting fragments from llm_client::prompts.
//
// Builders are pure: same input, same prompt. Input data is embedded whole, never
// truncated, and every user prompt ends with the schema example the decoder expects.

use serde::Serialize;
use serde_json::json;

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, SCHEMA_INSTRUCTION, SECTION_NAME_INSTRUCTION};
use crate::models::resume::{ResumeInput, ResumeSection};
use crate::models::skills::SkillSet;

/// System instruction + user prompt for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePrompt {
    pub system: String,
    pub user: String,
}

/// Replaces `{key}` placeholders in one left-to-right pass over the template.
/// Inserted values are never rescanned, so data that happens to contain a
/// placeholder is embedded as-is. Unknown `{...}` text is left untouched.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = vars.iter().find(|(key, _)| {
            tail.starts_with(key) && tail[key.len()..].starts_with('}')
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

const EXTRACTION_ROLE: &str = "You are a precise skill extraction assistant. \
    Extract only skills explicitly mentioned in the job description.";

const EXTRACTION_TEMPLATE: &str = r#"Parse this job description and extract EVERY keyword that could help match a candidate. Be aggressive and thorough:
1. Technical skills (both stated and implied)
2. Software / tools / platforms
3. Methodologies / processes
4. Domain expertise areas
5. Industry terminology

RULES:
- REQUIRED skills: explicit must-haves ("required", "must have", "you will need", minimum years).
- NICE-TO-HAVE skills: "preferred", "bonus", "nice to have", "a plus".
- `context` is the EXACT text from the job description where the skill is mentioned. Quote it verbatim.
- `importance` is an INTEGER from 1 to 10 (10 = critical to the role). Never 0, never above 10.
- `level` is the seniority: "junior", "mid", "senior", "staff", "principal", "director", or "unknown".

JOB DESCRIPTION:
{job_text}

{schema_instruction}
{schema}"#;

const EXTRACTION_SCHEMA: &str = r#"{
  "required_skills": [
    {"name": "Kubernetes", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 9}
  ],
  "nice_to_have_skills": [
    {"name": "Terraform", "context": "Terraform experience is a plus", "importance": 4}
  ],
  "company_info": {
    "name": "company name",
    "position": "job title",
    "level": "senior"
  }
}"#;

pub fn build_extraction_prompt(job_text: &str) -> StagePrompt {
    StagePrompt {
        system: format!("{EXTRACTION_ROLE} {JSON_ONLY_SYSTEM}"),
        user: fill(
            EXTRACTION_TEMPLATE,
            &[
                ("job_text", job_text),
                ("schema_instruction", SCHEMA_INSTRUCTION),
                ("schema", EXTRACTION_SCHEMA),
            ],
        ),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring
// ────────────────────────────────────────────────────────────────────────────

const SCORING_ROLE: &str = "You are a resume evaluation assistant. \
    Score how well each resume entry matches the job requirements.";

const SCORING_TEMPLATE: &str = r#"Score how each part of this resume matches the job requirements. Be brutally honest about what's missing or weak.

JOB REQUIREMENTS:
{skills_json}

{section_rule}

RESUME:
{resume}

SCORING RULES:
- `score` is a number from 0 to 10 (decimals allowed). 10 = the section proves every required skill.
- `score_reasoning` says WHY the section scores as it does: be specific about what's missing or weak, in enough detail to rewrite the section from it.
- `original_content` is the section's bullets copied verbatim, one bullet per line.
- `missing_skills` lists job skills the section does not demonstrate, copied from the job requirements with the same `context` and `importance` (integer 1-10).
- `overall_score` (0-10) and `overall_comments` (3-4 sentences) cover the whole resume.

{schema_instruction}
{schema}"#;

const FREE_TEXT_SECTION_RULE: &str = "\
    Split the resume into sections: one per job held and one per project. Ignore education, \
    summary, and skills lists. Name an experience section 'Company-Position' and a project \
    section by its project name. Every section name must be unique.";

const SCORING_SCHEMA: &str = r#"{
  "overall_score": 6.5,
  "overall_comments": "overall comments on the resume, existing skills, missing skills",
  "sections": [
    {
      "name": "Acme-Software Engineer",
      "original_content": "Built internal tools in Python\nReduced deploy time by 40%",
      "score": 5.5,
      "score_reasoning": "WHY this section scores as it does",
      "missing_skills": [
        {"name": "Kubernetes", "context": "Requires: Go, Kubernetes, 5+ years", "importance": 9}
      ]
    }
  ]
}"#;

#[derive(Serialize)]
struct PromptSection<'a> {
    name: &'a str,
    content: String,
}

pub fn build_scoring_prompt(
    skills: &SkillSet,
    resume: &ResumeInput,
) -> Result<StagePrompt, serde_json::Error> {
    let skills_json = serde_json::to_string_pretty(skills)?;

    let (section_rule, resume_text) = match resume {
        ResumeInput::Text(text) => (FREE_TEXT_SECTION_RULE.to_string(), text.clone()),
        ResumeInput::Sections(sections) => {
            let names = sections
                .iter()
                .map(|s| format!("\"{}\"", s.name))
                .collect::<Vec<_>>()
                .join(", ");
            let rule = format!(
                "{SECTION_NAME_INSTRUCTION}\nScore EXACTLY these {} sections, one output section each: {names}",
                sections.len()
            );
            let payload: Vec<PromptSection> = sections
                .iter()
                .map(|s| PromptSection {
                    name: &s.name,
                    content: s.content(),
                })
                .collect();
            (rule, serde_json::to_string_pretty(&payload)?)
        }
    };

    Ok(StagePrompt {
        system: format!("{SCORING_ROLE} {JSON_ONLY_SYSTEM}"),
        user: fill(
            SCORING_TEMPLATE,
            &[
                ("skills_json", &skills_json),
                ("section_rule", &section_rule),
                ("resume", &resume_text),
                ("schema_instruction", SCHEMA_INSTRUCTION),
                ("schema", SCORING_SCHEMA),
            ],
        ),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Transformation
// ────────────────────────────────────────────────────────────────────────────

const TRANSFORMATION_ROLE: &str = "You are a resume optimization expert \
    who helps tailor resumes to specific job descriptions.";

const TRANSFORMATION_TEMPLATE: &str = r#"Transform these resume bullets to exactly match the job requirements:
1. Replace weak or generic skill language with the skills from `missing_skills`
2. Keep metrics (numbers, percentages) but apply them to the new context
3. Use direct, simple language with job-specific terms
4. Stay within ±25% of each original bullet's character count
5. Start every bullet with a strong action verb

TARGET ROLE:
{role_json}

SECTION TO TRANSFORM:
{section_json}

{section_rule}
The section has EXACTLY {bullet_count} bullets. Return EXACTLY {bullet_count} items, one per original bullet, in the original order. `original_bullet` is the original text copied verbatim.
Scores are numbers from 0 to 10. `original_skills` and `added_skills` are lists of skill names.

{schema_instruction}
{schema}"#;

const TRANSFORMATION_SCHEMA: &str = r#"{
  "name": "name of section, exactly as given",
  "items": [
    {
      "original_bullet": "original text",
      "transformed_bullet": "rewritten text",
      "char_count_original": 120,
      "char_count_new": 115,
      "original_skills": ["skills already in bullet"],
      "added_skills": ["new skills emphasized"],
      "original_score": 5,
      "new_score": 8
    }
  ],
  "improvement_explanation": "how this rewrite addresses the weaknesses of this section (2-3 sentences)"
}"#;

pub fn build_transformation_prompt(
    section: &ResumeSection,
    skills: Option<&SkillSet>,
) -> Result<StagePrompt, serde_json::Error> {
    let bullets = section.bullets();

    let role_json = serde_json::to_string_pretty(&match skills {
        Some(skills) => json!({
            "company": skills.company.name,
            "position": skills.company.position,
            "level": skills.company.level,
            "required_skills": skills.required_names(),
        }),
        None => json!({}),
    })?;

    let section_json = serde_json::to_string_pretty(&json!({
        "name": section.name,
        "bullets": bullets,
        "score": section.score,
        "score_reasoning": section.score_reasoning,
        "missing_skills": section.missing_skills,
    }))?;

    let section_rule = format!(
        "{SECTION_NAME_INSTRUCTION}\nThe output `name` MUST be \"{}\".",
        section.name
    );

    Ok(StagePrompt {
        system: format!("{TRANSFORMATION_ROLE} {JSON_ONLY_SYSTEM}"),
        user: fill(
            TRANSFORMATION_TEMPLATE,
            &[
                ("role_json", &role_json),
                ("section_json", &section_json),
                ("section_rule", &section_rule),
                ("bullet_count", &bullets.len().to_string()),
                ("schema_instruction", SCHEMA_INSTRUCTION),
                ("schema", TRANSFORMATION_SCHEMA),
            ],
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::SourceSection;
    use crate::models::skills::{CompanyInfo, RawSkill};

    fn skills() -> SkillSet {
        SkillSet {
            required: vec![
                RawSkill {
                    name: "Go".to_string(),
                    context: "Requires: Go, Kubernetes, 5+ years".to_string(),
                    importance: 9,
                },
                RawSkill {
                    name: "Kubernetes".to_string(),
                    context: "Requires: Go, Kubernetes, 5+ years".to_string(),
                    importance: 8,
                },
            ],
            nice_to_have: vec![],
            company: CompanyInfo {
                name: "Acme".to_string(),
                position: "Platform Engineer".to_string(),
                level: "senior".to_string(),
            },
        }
    }

    fn section() -> ResumeSection {
        ResumeSection {
            name: "Acme-Engineer".to_string(),
            original_content: "- Built internal tools in Python\n- Ran on-call rotation".to_string(),
            score: 4.0,
            score_reasoning: "No Go or Kubernetes".to_string(),
            missing_skills: skills().required,
        }
    }

    #[test]
    fn test_extraction_prompt_embeds_job_text_and_ends_with_schema() {
        let job = "Requires: Go, Kubernetes, 5+ years. ".repeat(500);
        let prompt = build_extraction_prompt(&job);
        assert!(prompt.user.contains(&job), "job text must not be truncated");
        assert!(prompt.user.trim_end().ends_with(EXTRACTION_SCHEMA));
        assert!(prompt.system.contains("JSON"));
    }

    #[test]
    fn test_extraction_prompt_is_deterministic() {
        assert_eq!(build_extraction_prompt("x"), build_extraction_prompt("x"));
    }

    #[test]
    fn test_scoring_prompt_free_text() {
        let prompt =
            build_scoring_prompt(&skills(), &ResumeInput::Text("Built internal tools in Python".into()))
                .unwrap();
        assert!(prompt.user.contains("Built internal tools in Python"));
        assert!(prompt.user.contains("\"Kubernetes\""));
        assert!(prompt.user.contains("Company-Position"));
        assert!(prompt.user.trim_end().ends_with(SCORING_SCHEMA));
    }

    #[test]
    fn test_scoring_prompt_structured_lists_every_section_name() {
        let resume = ResumeInput::Sections(vec![
            SourceSection {
                name: "Acme-Engineer".into(),
                bullets: vec!["Built internal tools in Python".into()],
            },
            SourceSection {
                name: "SideProject".into(),
                bullets: vec!["Wrote a CLI".into(), "Published crate".into()],
            },
        ]);
        let prompt = build_scoring_prompt(&skills(), &resume).unwrap();
        assert!(prompt.user.contains("EXACTLY these 2 sections"));
        assert!(prompt.user.contains("\"Acme-Engineer\", \"SideProject\""));
        assert!(prompt.user.contains("Wrote a CLI\\nPublished crate"));
    }

    #[test]
    fn test_transformation_prompt_states_bullet_count_and_name() {
        let prompt = build_transformation_prompt(&section(), Some(&skills())).unwrap();
        assert!(prompt.user.contains("EXACTLY 2 bullets"));
        assert!(prompt.user.contains("The output `name` MUST be \"Acme-Engineer\""));
        assert!(prompt.user.contains("Built internal tools in Python"));
        assert!(prompt.user.contains("Platform Engineer"));
        assert!(prompt.user.contains("±25%"));
        assert!(prompt.user.trim_end().ends_with(TRANSFORMATION_SCHEMA));
    }

    #[test]
    fn test_fill_does_not_expand_placeholders_inside_values() {
        let out = fill("A={a} B={b} C={c}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "A={b} B=x C={c}");
    }

    #[test]
    fn test_scoring_prompt_keeps_braces_in_skill_context() {
        let mut skills = skills();
        skills.required[0].context = "Experience with {resume} style placeholders".to_string();
        let resume = ResumeInput::Text("Built internal tools in Python".into());

        let prompt = build_scoring_prompt(&skills, &resume).unwrap();

        assert!(prompt.user.contains("Experience with {resume} style placeholders"));
        assert_eq!(prompt.user.matches("Built internal tools in Python").count(), 1);
    }

    #[test]
    fn test_transformation_prompt_keeps_braces_in_role_data() {
        let mut skills = skills();
        skills.company.position = "Engineer {section_json} {section_rule}".to_string();

        let prompt = build_transformation_prompt(&section(), Some(&skills)).unwrap();

        assert!(prompt.user.contains("Engineer {section_json} {section_rule}"));
        assert_eq!(prompt.user.matches("\"score_reasoning\": \"No Go or Kubernetes\"").count(), 1);
        assert_eq!(prompt.user.matches("MUST be \"Acme-Engineer\"").count(), 1);
    }

    #[test]
    fn test_transformation_prompt_without_skills() {
        let prompt = build_transformation_prompt(&section(), None).unwrap();
        assert!(prompt.user.contains("TARGET ROLE:\n{}"));
        assert!(prompt.user.contains("Kubernetes"), "missing skills still embedded");
    }
}
