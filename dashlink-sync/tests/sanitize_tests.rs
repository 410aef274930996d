use dashlink_sync::{SyncError, ensure_wire_safe, sanitize_payload};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── sanitize_payload ─────────────────────────────────────────────

#[test]
fn marker_fields_are_dropped() {
    assert_eq!(
        sanitize_payload(json!({"coins": "undefined", "tier": "free"})),
        Some(json!({"tier": "free"}))
    );
}

#[test]
fn object_object_marker_is_dropped() {
    assert_eq!(
        sanitize_payload(json!({"wallet": "[object Object]", "amount": 10})),
        Some(json!({"amount": 10}))
    );
}

#[test]
fn whole_payload_marker_is_none() {
    assert_eq!(sanitize_payload(json!("undefined")), None);
}

#[test]
fn explicit_null_is_preserved() {
    assert_eq!(
        sanitize_payload(json!({"referred_by": null})),
        Some(json!({"referred_by": null}))
    );
}

#[test]
fn nested_objects_are_sanitized_recursively() {
    assert_eq!(
        sanitize_payload(json!({"stats": {"wins": "undefined", "losses": 3}})),
        Some(json!({"stats": {"losses": 3}}))
    );
}

#[test]
fn object_emptied_by_sanitization_is_dropped() {
    assert_eq!(
        sanitize_payload(json!({"stats": {"wins": "undefined"}, "coins": 1})),
        Some(json!({"coins": 1}))
    );
}

#[test]
fn empty_object_input_passes_through() {
    // Only objects that *became* empty are dropped.
    assert_eq!(sanitize_payload(json!({})), Some(json!({})));
}

#[test]
fn array_markers_become_nulls() {
    assert_eq!(
        sanitize_payload(json!(["a", "undefined", "b"])),
        Some(json!(["a", null, "b"]))
    );
}

#[test]
fn marker_keys_are_dropped() {
    assert_eq!(
        sanitize_payload(json!({"undefined": 1, "coins": 2})),
        Some(json!({"coins": 2}))
    );
}

#[test]
fn legitimate_strings_survive() {
    let payload = json!({"title": "undefined behavior in C", "note": "object"});
    assert_eq!(sanitize_payload(payload.clone()), Some(payload));
}

// ── ensure_wire_safe ─────────────────────────────────────────────

#[test]
fn clean_payload_is_wire_safe() {
    assert!(ensure_wire_safe("entities/u1", &json!({"coins": 5})).is_ok());
}

#[test]
fn surviving_marker_is_rejected_with_location() {
    let err = ensure_wire_safe(
        "entities/u1",
        &json!({"stats": {"wins": "undefined"}}),
    )
    .unwrap_err();
    match err {
        SyncError::Validation { path, reason } => {
            assert_eq!(path, "entities/u1");
            assert!(reason.contains("/stats/wins"), "reason: {reason}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn marker_in_array_is_located_by_index() {
    let err = ensure_wire_safe("tasks", &json!({"items": [1, "[object Object]"]})).unwrap_err();
    match err {
        SyncError::Validation { reason, .. } => {
            assert!(reason.contains("/items/1"), "reason: {reason}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}
