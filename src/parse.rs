//! Response parsing for model completions.
//!
//! The model is prompted to answer as a JSON object with three Korean keys:
//! `요약` (summary), `분류` (prediction), `근거` (reason). Smaller responses
//! sometimes come back as labeled plain text instead:
//!
//! ```text
//! 요약: ...
//!
//! 분류: ...
//!
//! 근거: ...
//! ```
//!
//! [`parse_completion`] accepts both shapes; anything else is an error.

use serde_json::Value;
use std::error::Error;

/// The three fields extracted from a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFields {
    pub summary: String,
    pub pred: String,
    pub reason: String,
}

/// Extract summary, prediction, and reason from a completion's text body.
///
/// Content that looks like a JSON object is decoded and read by key; missing
/// keys default to empty strings. Otherwise the fixed-line plain-text shape is
/// tried: lines 0, 2, and 4 carry the labeled fields.
pub fn parse_completion(content: &str) -> Result<ParsedFields, Box<dyn Error>> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        let parsed: Value = serde_json::from_str(trimmed)
            .map_err(|_| "Unexpected content format: Not a valid JSON")?;
        return Ok(ParsedFields {
            summary: string_field(&parsed, "요약"),
            pred: string_field(&parsed, "분류"),
            reason: string_field(&parsed, "근거"),
        });
    }

    let lines: Vec<&str> = trimmed.split('\n').collect();
    if lines.len() >= 5 {
        let summary = strip_label(lines[0], "요약:");
        let pred = strip_label(lines[2], "분류:");
        let reason = strip_label(lines[4], "근거:");
        if summary.is_some() || pred.is_some() || reason.is_some() {
            return Ok(ParsedFields {
                summary: summary.unwrap_or_default(),
                pred: pred.unwrap_or_default(),
                reason: reason.unwrap_or_default(),
            });
        }
    }

    Err("Unexpected content format: Not a valid JSON".into())
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn strip_label(line: &str, label: &str) -> Option<String> {
    line.contains(label)
        .then(|| line.replace(label, "").trim().to_string())
}
