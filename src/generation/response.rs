//! Normalisation of model output into a presentation document
//!
//! Models wrap JSON in markdown fences, add chatter around it and leave
//! trailing commas. The cleanup here is deliberately narrow: anything that
//! still fails to parse afterwards is reported as invalid content.

use serde_json::Value;

use crate::errors::{GenerationError, GenerationResult};

/// Extract a JSON object from raw model text.
pub fn normalize_presentation_json(raw: &str) -> GenerationResult<String> {
    let trimmed = raw.trim();
    let stripped = strip_fences(trimmed);
    // The object may sit on the opening fence line itself
    let candidate = if stripped.contains('{') {
        outer_object(stripped)
    } else {
        outer_object(trimmed)
    };

    if is_object(candidate) {
        return Ok(candidate.to_string());
    }

    let repaired = strip_trailing_commas(&candidate.replace(['\n', '\r', '\t'], " "));
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(_)) => Ok(repaired),
        Ok(other) => Err(GenerationError::InvalidContent {
            message: format!("expected a JSON object, got {}", kind(&other)),
        }),
        Err(e) => Err(GenerationError::InvalidContent {
            message: e.to_string(),
        }),
    }
}

fn is_object(text: &str) -> bool {
    matches!(serde_json::from_str::<Value>(text), Ok(Value::Object(_)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag on the opening fence line, or directly in front
    // of the body when the whole reply is one line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn outer_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Remove commas that directly precede a closing bracket, ignoring string
/// contents.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_comma: Option<usize> = None;

    for ch in text.chars() {
        if in_string {
            out.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            ']' | '}' => {
                if let Some(at) = pending_comma.take() {
                    out.remove(at);
                }
            }
            ',' => {
                pending_comma = Some(out.len());
            }
            c if c.is_whitespace() => {}
            '"' => {
                pending_comma = None;
                in_string = true;
            }
            _ => pending_comma = None,
        }
        out.push(ch);
    }
    out
}
