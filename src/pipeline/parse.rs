//! Recovery of a structured [`AnalysisRecord`] from free-form model text.
//!
//! Vision models are asked for "JSON ONLY" and routinely ignore it: they
//! wrap the object in ```` ```json ```` fences, add a sentence before or
//! after, use single quotes, or break long strings across lines. The
//! passes below undo those habits in a fixed order:
//!
//! 1. Strip a code fence (a `json`-labelled one wins over the first fence)
//! 2. Narrow to the span from the first `{` to the last `}`
//! 3. Parse strictly
//! 4. On failure, repair quotes and line breaks and parse again
//!
//! Every pass is a pure `&str` function so each one is testable alone.

use crate::error::ParseError;
use crate::output::AnalysisRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Parse a model reply into an [`AnalysisRecord`].
///
/// Deterministic: the same input always yields the same record or the same
/// error. Fails only when no JSON object can be recovered; the error carries
/// at most 200 characters of the narrowed text.
pub fn parse_structured_response(raw: &str) -> Result<AnalysisRecord, ParseError> {
    let unfenced = strip_code_fence(raw);
    let narrowed = narrow_to_object(unfenced).ok_or_else(|| ParseError::from_text(unfenced))?;

    if let Some(record) = parse_object(narrowed) {
        debug!("Model reply parsed as strict JSON");
        return Ok(record);
    }

    let repaired = repair_json(narrowed);
    if let Some(record) = parse_object(&repaired) {
        debug!("Model reply parsed after quote/newline repair");
        return Ok(record);
    }

    Err(ParseError::from_text(narrowed))
}

// ── Pass 1: Strip code fence ─────────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap());

/// A language label only counts as one when a line break follows it, so an
/// inline fence such as ```` ```{...}``` ```` keeps its body.
static RE_ANY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?(.*?)(?:```|\z)").unwrap()
});

/// Contents of the `json`-labelled fence, else of the first fence, else the
/// whole input. A missing closing fence takes everything to the end.
fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    RE_JSON_FENCE
        .captures(trimmed)
        .or_else(|| RE_ANY_FENCE.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

// ── Pass 2: Narrow to the outermost object ───────────────────────────────────

fn narrow_to_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

// ── Pass 3: Strict parse ─────────────────────────────────────────────────────

fn parse_object(candidate: &str) -> Option<AnalysisRecord> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

// ── Pass 4: Repair ───────────────────────────────────────────────────────────

/// Single quotes become double quotes; raw line breaks become spaces.
fn repair_json(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\'' => '"',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}
