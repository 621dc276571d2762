use serde_json::Value;

use crate::errors::AppError;
use crate::models::Feature;
use crate::sanitizer::sanitize;

/// Sanitizes raw model text and parses it as a JSON object.
///
/// Fails with [`AppError::DecodeError`] when the cleaned text is not JSON or its top level
/// is not an object. Both the raw and the cleaned text travel with the error so they can be
/// logged; neither is ever shown to a caller.
pub fn decode(feature: Feature, raw: &str) -> Result<Value, AppError> {
    let cleaned = sanitize(raw);

    let reason = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value @ Value::Object(_)) => return Ok(value),
        Ok(other) => format!("expected a JSON object, found {}", json_kind(&other)),
        Err(e) => e.to_string(),
    };

    Err(AppError::DecodeError {
        feature,
        raw: raw.to_string(),
        cleaned,
        reason,
    })
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
