//! Lenient payload decoding.
//!
//! The server has changed shape across releases.  A response that is not
//! the expected container degrades to an empty collection, and a single
//! record that does not decode is skipped rather than failing the page.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use rasman_shared::Session;

/// Decode every element of a JSON array, skipping records that do not fit.
pub(crate) fn records<T: DeserializeOwned>(endpoint: &str, items: Vec<Value>) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(endpoint, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect();

    if decoded.len() != total {
        warn!(
            endpoint,
            skipped = total - decoded.len(),
            total,
            "Some records could not be decoded"
        );
    }
    decoded
}

/// A bare JSON array of records.  Anything else is an empty list.
pub(crate) fn list<T: DeserializeOwned>(endpoint: &str, value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => records(endpoint, items),
        other => {
            warn!(endpoint, kind = kind_of(&other), "Expected a list, treating as empty");
            Vec::new()
        }
    }
}

/// `{"sessions": [...]}`.  Anything else is an empty list.
pub(crate) fn sessions_envelope(endpoint: &str, value: Value) -> Vec<Session> {
    match value {
        Value::Object(mut map) => match map.remove("sessions") {
            Some(Value::Array(items)) => records(endpoint, items),
            _ => {
                warn!(endpoint, "Response has no sessions array, treating as empty");
                Vec::new()
            }
        },
        other => {
            warn!(endpoint, kind = kind_of(&other), "Expected a sessions object, treating as empty");
            Vec::new()
        }
    }
}

/// Count sessions in whichever shape the server used: the usual envelope, a
/// bare list, `{"count": n}`, or a bare integer.  Unknown shapes count 0.
pub(crate) fn session_count(value: &Value) -> usize {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("sessions") {
                items.len()
            } else if let Some(count) = map.get("count").and_then(Value::as_u64) {
                count as usize
            } else {
                0
            }
        }
        Value::Array(items) => items.len(),
        Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        _ => 0,
    }
}

/// A single JSON object.  Anything else is treated as "not found".
pub(crate) fn object<T: DeserializeOwned>(endpoint: &str, value: Value) -> Option<T> {
    if !value.is_object() {
        warn!(endpoint, kind = kind_of(&value), "Expected an object");
        return None;
    }
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(endpoint, error = %e, "Malformed object");
            None
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
