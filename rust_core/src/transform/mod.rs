//! Provider payload -> local entity transforms.
//!
//! Transforms are pure. Any field with a local counterpart is mapped; a field
//! missing from the payload becomes `None`. The only failure is a record with
//! no usable stable key, which the run counts as failed.

pub mod blob;
pub mod dates;
pub mod game;
pub mod news;
pub mod physical;
pub mod player;
pub mod stats;
pub mod team;

pub use blob::JsonBlob;

use serde_json::Value;

/// Non-empty string at `key`. Numbers are stringified since providers
/// flip between `"15"` and `15` for identifiers.
pub(crate) fn str_field(v: &Value, key: &str) -> Option<String> {
    value_to_string(v.get(key)?)
}

pub(crate) fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer at `key`, accepting numeric strings ("112") and whole floats.
pub(crate) fn int_field(v: &Value, key: &str) -> Option<i64> {
    value_to_int(v.get(key)?)
}

pub(crate) fn value_to_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        }
        _ => None,
    }
}

pub(crate) fn float_field(v: &Value, key: &str) -> Option<f64> {
    match v.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

pub(crate) fn bool_field(v: &Value, key: &str) -> Option<bool> {
    match v.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "active" | "yes" => Some(true),
            "false" | "inactive" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Trailing numeric id of a Core API `$ref` path segment, e.g.
/// `.../teams/15?lang=en` with segment `teams` gives `15`.
pub(crate) fn id_from_ref(reference: &str, segment: &str) -> Option<String> {
    let marker = format!("/{}/", segment);
    let start = reference.rfind(&marker)? + marker.len();
    let id: String = reference[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}
