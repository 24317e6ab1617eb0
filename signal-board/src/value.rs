//! Safe accessors over untrusted upstream JSON.
//!
//! Upstream payloads are kept as [`serde_json::Value`] and probed field by field, never
//! deserialised into a fixed schema.

use serde_json::Value;

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Field of a JSON object, treating an explicit `null` as absent.
pub fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|field| !field.is_null())
}

/// String field of a JSON object, `None` if absent or not a string.
pub fn field_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Render a JSON value as plain text: strings verbatim, anything else as its JSON text.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Top-level keys of a JSON object, used for diagnostics only.
pub fn keys(value: &Value) -> Option<Vec<&str>> {
    value
        .as_object()
        .map(|fields| fields.keys().map(String::as_str).collect())
}
