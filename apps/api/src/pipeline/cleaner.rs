//! Content Cleaner: reduces job-posting markup to text and unwraps fenced model output.
//!
//! Neither function fails: malformed markup degrades to a regex tag-stripper and
//! unmatched fences return the trimmed input.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

/// Elements whose whole subtree is boilerplate.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "iframe", "noscript", "svg", "template",
];

/// Class names of known boilerplate containers.
const BOILERPLATE_CLASSES: &[&str] = &[
    "menu",
    "navigation",
    "social",
    "banner",
    "ads",
    "cookie",
    "popup",
];

/// Containers that hold only the posting on common job boards, tried in order.
const JOB_CONTAINER_SELECTORS: &[&str] = &[
    "[data-automation='jobDescription']",
    "#jobDescriptionText",
    ".jobsearch-JobComponent-description",
    ".description__text",
    ".job-description",
    "#job-description",
    ".posting-page",
    "[itemprop='description']",
];

/// Elements that start a new line in the extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "section",
    "article", "dd", "dt", "pre", "blockquote",
];

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn script_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("static regex")
    })
}

fn stray_script_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<\s*/?\s*(script|style)[^>]*>?").expect("static regex"))
}

// ────────────────────────────────────────────────────────────────────────────
// Markup
// ────────────────────────────────────────────────────────────────────────────

/// Reduces raw job-posting markup to readable text.
///
/// 1. Parse the document; prefer a known job-description container, else `<body>`.
/// 2. Collect text, skipping boilerplate elements and classes.
/// 3. Collapse whitespace: one space between words, one newline between blocks.
/// 4. If the DOM yields nothing, fall back to stripping tags with a regex.
pub fn clean_markup(html: &str) -> String {
    let text = match extract_from_dom(html) {
        Some(text) => text,
        None => {
            if !html.trim().is_empty() {
                warn!("Markup yielded no text from the DOM, falling back to tag stripping");
            }
            strip_tags(html)
        }
    };

    let text = stray_script_tag_regex().replace_all(&text, " ");
    let cleaned = collapse_whitespace(&text);
    debug!(
        "Cleaned markup: original_length={}, cleaned_length={}",
        html.len(),
        cleaned.len()
    );
    cleaned
}

fn extract_from_dom(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for raw in JOB_CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let mut text = String::new();
        for container in document.select(&selector) {
            collect_text(container, &mut text);
            text.push('\n');
        }
        if has_words(&text) {
            debug!("Using job container matched by {raw}");
            return Some(text);
        }
    }

    let mut text = String::new();
    match Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
    {
        Some(body) => collect_text(body, &mut text),
        None => collect_text(document.root_element(), &mut text),
    }

    has_words(&text).then_some(text)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            // Newlines inside markup text are layout, not content.
            Node::Text(text) => out.push_str(&text.replace(['\n', '\r'], " ")),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) || el.classes().any(is_boilerplate_class) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn is_boilerplate_class(class: &str) -> bool {
    BOILERPLATE_CLASSES
        .iter()
        .any(|c| class.eq_ignore_ascii_case(c))
}

fn has_words(text: &str) -> bool {
    text.chars().any(|c| !c.is_whitespace())
}

/// Regex fallback: drops script/style blocks, then every remaining tag.
fn strip_tags(html: &str) -> String {
    let without_blocks = script_block_regex().replace_all(html, " ");
    tag_regex().replace_all(&without_blocks, " ").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// Model output
// ────────────────────────────────────────────────────────────────────────────

const FENCE: &str = "```";
const TAGGED_FENCES: &[&str] = &["```json", "```yaml", "```yml"];

/// Returns the interior of the first..last code fence in model output, trimmed.
///
/// A language-tagged opening fence is preferred over a bare one. Text without fences,
/// or with a single dangling fence, is returned trimmed and otherwise unchanged.
pub fn clean_model_output(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.contains(FENCE) {
        return trimmed;
    }

    let start = TAGGED_FENCES
        .iter()
        .find_map(|tag| trimmed.find(tag).map(|i| i + tag.len()))
        .or_else(|| trimmed.find(FENCE).map(|i| skip_fence_tag(trimmed, i + FENCE.len())));

    let end = trimmed.rfind(FENCE);

    match (start, end) {
        (Some(start), Some(end)) if end > start => trimmed[start..end].trim(),
        _ => trimmed,
    }
}

/// Skips an unknown language tag (e.g. `toml`) directly after a bare fence.
fn skip_fence_tag(text: &str, after_fence: usize) -> usize {
    let rest = &text[after_fence..];
    let line_end = rest.find('\n').unwrap_or(rest.len());
    let tag = &rest[..line_end];
    let is_tag = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+');
    if is_tag {
        after_fence + line_end
    } else {
        after_fence
    }
}
