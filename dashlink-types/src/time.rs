//! Timestamp normalization.
//!
//! Remote records carry timestamps in whatever shape the writing client
//! produced: RFC 3339 / ISO-8601 strings, numeric epochs (seconds or
//! milliseconds), or the store's unresolved server-timestamp sentinel
//! (`{".sv": "timestamp"}`). Everything is normalized to a concrete
//! `DateTime<Utc>`; sentinels and garbage resolve to the caller-supplied
//! fallback so an entity never carries a placeholder.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Epoch values above this are treated as milliseconds, below as seconds.
/// (Year ~2128 in seconds, year 1970-03 in milliseconds; no real data
/// falls in the ambiguous band.)
const MILLIS_CUTOFF: f64 = 5_000_000_000.0;

/// Normalizes a timestamp-like JSON value to a concrete point in time.
#[must_use]
pub fn normalize_timestamp(value: &Value, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(fallback),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite() && *f > 0.0)
            .and_then(from_epoch)
            .unwrap_or(fallback),
        // Server-timestamp sentinel (or any other object): not yet
        // resolved by the store, so the best concrete value is "now".
        _ => fallback,
    }
}

fn from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    let millis = if epoch >= MILLIS_CUTOFF {
        epoch
    } else {
        epoch * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}
