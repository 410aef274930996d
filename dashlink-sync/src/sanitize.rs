//! Outbound payload sanitization.
//!
//! A stringified `undefined` (or `[object Object]`) written into a
//! remote record corrupts it for every client that reads it back. This
//! module removes those markers depth-first before a payload leaves the
//! client, and `ensure_wire_safe` is the final assertion run on the
//! sanitized payload; if a marker survives, the write is aborted with a
//! validation failure instead of contacting the network.
//!
//! Explicit `null`s are preserved: they are the wire form of an
//! intentional field clear.

use crate::error::{SyncError, SyncResult};
use serde_json::{Map, Value};

/// String values that only appear when a missing variable leaked into a
/// payload. Never legitimate data.
const UNDEFINED_MARKERS: [&str; 2] = ["undefined", "[object Object]"];

/// Sanitizes a payload depth-first.
///
/// Marker fields are dropped, nested objects are sanitized recursively
/// and dropped entirely if that empties them, array slots holding a
/// marker become explicit nulls (dropping would shift indices), and
/// nulls pass through unchanged. Returns `None` when the whole payload
/// was a marker.
#[must_use]
pub fn sanitize_payload(value: Value) -> Option<Value> {
    match value {
        Value::String(s) if UNDEFINED_MARKERS.contains(&s.as_str()) => None,
        Value::Object(map) => {
            let was_populated = !map.is_empty();
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                if UNDEFINED_MARKERS.contains(&key.as_str()) {
                    continue;
                }
                if let Some(clean) = sanitize_payload(child) {
                    out.insert(key, clean);
                }
            }
            if was_populated && out.is_empty() {
                None
            } else {
                Some(Value::Object(out))
            }
        }
        Value::Array(items) => Some(Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_payload(item).unwrap_or(Value::Null))
                .collect(),
        )),
        other => Some(other),
    }
}

/// Final pre-wire assertion: scans the payload for any surviving
/// undefined marker (string value or object key) and rejects the write.
pub fn ensure_wire_safe(path: &str, value: &Value) -> SyncResult<()> {
    if let Some(location) = find_marker(value, String::new()) {
        return Err(SyncError::validation(
            path,
            format!("payload contains undefined marker at {location:?}"),
        ));
    }
    Ok(())
}

fn find_marker(value: &Value, location: String) -> Option<String> {
    match value {
        Value::String(s) if UNDEFINED_MARKERS.contains(&s.as_str()) => Some(location),
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            let child_location = format!("{location}/{key}");
            if UNDEFINED_MARKERS.contains(&key.as_str()) {
                return Some(child_location);
            }
            find_marker(child, child_location)
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| find_marker(item, format!("{location}/{i}"))),
        _ => None,
    }
}
