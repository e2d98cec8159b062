//! Turns free-form model output into payout entries.
//!
//! The model is asked for a JSON array but routinely answers with a fenced
//! block, a single bare object, or several bare objects one after another.
//! [`normalize`] accepts those shapes and nothing looser: anything the repair
//! step cannot split cleanly is reported as [`ErrorKind::Unparseable`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::core::error::{snippet, ErrorKind, StageError};
use crate::core::types::PayoutEntry;

/// Characters of offending text kept in parse diagnostics.
pub const SNIPPET_CHARS: usize = 300;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap());
static ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)(?:```|\z)").unwrap());

const CURRENCY_CHARS: [char; 5] = ['$', '€', '£', '¥', ','];

#[derive(Debug, Clone, PartialEq)]
pub struct Payouts {
    pub entries: Vec<PayoutEntry>,
    pub total: f64,
}

/// The interior of the first ```json fence, else of the first fence, else
/// the whole text.
pub fn extract_payload(raw: &str) -> &str {
    JSON_FENCE
        .captures(raw)
        .or_else(|| ANY_FENCE.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
}

/// Split a run of top-level JSON objects separated by whitespace and at most
/// one comma each. `None` if anything else sits between them or a brace or
/// string is left open.
pub fn split_top_level_objects(text: &str) -> Option<Vec<&str>> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0usize;
    let mut separated = false;

    for (i, c) in text.char_indices() {
        if depth == 0 {
            match c {
                '{' => {
                    if !objects.is_empty()
                        && !separated
                        && !text[..i].ends_with(char::is_whitespace)
                    {
                        // "}{" with nothing in between.
                        return None;
                    }
                    start = i;
                    depth = 1;
                    separated = false;
                }
                ',' if !objects.is_empty() && !separated => separated = true,
                c if c.is_whitespace() => {}
                _ => return None,
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    objects.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    if depth != 0 || objects.is_empty() {
        return None;
    }
    Some(objects)
}

/// Coerce `text` into something `serde_json` will read as an array or object.
pub fn repair(text: &str) -> Option<String> {
    let text = text.trim();
    if !text.starts_with('{') {
        return Some(text.to_string());
    }
    let objects = split_top_level_objects(text)?;
    if objects.len() == 1 {
        return Some(objects[0].to_string());
    }
    Some(format!("[{}]", objects.join(",")))
}

/// Numeric value of an `amount` field, if it has one.
pub fn coerce_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !CURRENCY_CHARS.contains(c) && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

fn unparseable(reason: impl std::fmt::Display, text: &str) -> StageError {
    StageError::new(
        ErrorKind::Unparseable,
        format!("{}; response was: {}", reason, snippet(text, SNIPPET_CHARS)),
    )
}

/// Parse model output into payout entries and their total.
pub fn normalize(raw: &str) -> Result<Payouts, StageError> {
    let payload = extract_payload(raw).trim();
    let repaired = repair(payload)
        .ok_or_else(|| unparseable("could not split top-level JSON objects", payload))?;

    let parsed: Value = serde_json::from_str(&repaired)
        .map_err(|e| unparseable(format!("invalid JSON: {}", e), payload))?;

    let items = match parsed {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(unparseable(
                format!("expected an array or object, got {}", json_type(&other)),
                payload,
            ))
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in &items {
        let Value::Object(fields) = item else {
            return Err(unparseable(
                format!("expected payout objects, got {}", json_type(item)),
                payload,
            ));
        };
        let Some(name) = fields.get("name").and_then(Value::as_str) else {
            return Err(unparseable("payout entry without a text name", payload));
        };

        match fields.get("amount").and_then(coerce_amount) {
            Some(amount) => entries.push(PayoutEntry {
                name: name.to_string(),
                amount,
            }),
            None => log::warn!(
                "Skipping payout for '{}': amount {:?} is not a number",
                name,
                fields.get("amount")
            ),
        }
    }

    let total = entries.iter().map(|e| e.amount).sum();
    Ok(Payouts { entries, total })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
