// Shared prompt constants and prompt-building utilities.
// Each stage defines its own prompts in pipeline::prompts.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT include explanations or apologies.";

/// Appended to every user prompt, right before the schema example.
pub const SCHEMA_INSTRUCTION: &str = "\
    Return valid JSON matching the schema below EXACTLY: same field names, same nesting, \
    no extra fields, no tab characters, every string value properly escaped.";

/// Instruction that keeps section names stable between Scoring and Transformation.
pub const SECTION_NAME_INSTRUCTION: &str = "\
    CRITICAL: Each section is identified by its `name`. Echo every name EXACTLY as given, \
    character for character. Never invent, merge, split, or rename sections.";
