//! Semi-structured JSON fields (contracts, alternate ids).
//!
//! Providers send these either as objects or as JSON serialized into a
//! string, sometimes more than once. `JsonBlob` captures which one arrived so
//! it is normalized exactly once at the transform boundary.

use serde_json::Value;
use tracing::warn;

/// Nested serialization deeper than this is treated as garbage
const MAX_DECODE_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonBlob {
    /// Provider-serialized JSON text
    Raw(String),
    /// Already a structured value
    Parsed(Value),
    Absent,
}

impl JsonBlob {
    pub fn from_field(field: Option<&Value>) -> Self {
        match field {
            None | Some(Value::Null) => JsonBlob::Absent,
            Some(Value::String(s)) => JsonBlob::Raw(s.clone()),
            Some(other) => JsonBlob::Parsed(other.clone()),
        }
    }

    /// Structured value or `None`. Never returns a JSON string that still
    /// holds encoded JSON.
    pub fn normalize(self) -> Option<Value> {
        match self {
            JsonBlob::Absent => None,
            JsonBlob::Parsed(v) => Some(v),
            JsonBlob::Raw(text) => decode(&text, 0),
        }
    }
}

fn decode(text: &str, depth: usize) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }
    if depth >= MAX_DECODE_DEPTH {
        warn!("JSON blob nested {} levels deep, dropping", depth);
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => decode(&inner, depth + 1),
        Ok(Value::Null) => None,
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Unparseable JSON blob ({} bytes): {}", trimmed.len(), e);
            None
        }
    }
}
