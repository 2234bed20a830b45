//! Validation and normalization of provider replies.
//!
//! A reply is accepted only when it is a JSON object carrying all four
//! analysis fields with the right types and a score inside `[1, 10]`.
//! Accepted values are normalized before they become an [`AnalysisResult`].

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::AnalysisResult;

/// Keys every reply must contain.
pub const REQUIRED_FIELDS: [&str; 4] = ["mood", "mood_score", "top_emotions", "summary"];

/// Lowest accepted mood score.
pub const MIN_MOOD_SCORE: f64 = 1.0;
/// Highest accepted mood score.
pub const MAX_MOOD_SCORE: f64 = 10.0;

/// Reason a reply was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseRejection {
    #[error("response is not a JSON object: {0}")]
    Malformed(String),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("mood_score {0} is outside [1, 10]")]
    OutOfRange(f64),

    #[error("field '{0}' is blank")]
    Blank(&'static str),
}

/// Parse, check and normalize a raw provider reply.
pub fn validate_response(raw: &str) -> Result<AnalysisResult, ResponseRejection> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| ResponseRejection::Malformed(e.to_string()))?;

    let Value::Object(record) = value else {
        return Err(ResponseRejection::Malformed(format!(
            "expected an object, found {}",
            json_kind(&value)
        )));
    };

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !record.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(ResponseRejection::MissingFields(missing));
    }

    let mood = string_field(&record, "mood")?;
    let mood_score = number_field(&record, "mood_score")?;
    let emotions = string_array_field(&record, "top_emotions")?;
    let summary = string_field(&record, "summary")?;

    if !(MIN_MOOD_SCORE..=MAX_MOOD_SCORE).contains(&mood_score) {
        return Err(ResponseRejection::OutOfRange(mood_score));
    }

    let mood = title_case(mood.trim());
    if mood.is_empty() {
        return Err(ResponseRejection::Blank("mood"));
    }

    let summary = summary.trim();
    if summary.is_empty() {
        return Err(ResponseRejection::Blank("summary"));
    }

    let top_emotions = emotions
        .into_iter()
        .map(str::trim)
        .filter(|emotion| !emotion.is_empty())
        .map(str::to_lowercase)
        .collect();

    Ok(AnalysisResult::from_normalized(
        mood,
        mood_score,
        top_emotions,
        summary.to_string(),
    ))
}

fn string_field<'a>(
    record: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ResponseRejection> {
    record
        .get(field)
        .and_then(Value::as_str)
        .ok_or(ResponseRejection::WrongType {
            field,
            expected: "a string",
        })
}

// Booleans are not numbers here.
fn number_field(record: &Map<String, Value>, field: &'static str) -> Result<f64, ResponseRejection> {
    match record.get(field) {
        Some(Value::Number(n)) => n.as_f64().ok_or(ResponseRejection::WrongType {
            field,
            expected: "a finite number",
        }),
        _ => Err(ResponseRejection::WrongType {
            field,
            expected: "a number",
        }),
    }
}

fn string_array_field<'a>(
    record: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Vec<&'a str>, ResponseRejection> {
    let wrong_type = ResponseRejection::WrongType {
        field,
        expected: "an array of strings",
    };

    let items = record
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| wrong_type.clone())?;

    items
        .iter()
        .map(|item| item.as_str().ok_or_else(|| wrong_type.clone()))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
