//! Integration tests for last-writer-wins conflict resolution.
//!
//! Walks the multi-device scenarios: out-of-order updates, delete versus
//! stale update, resurrection, idempotent re-push, and the per-row server
//! timestamp guarantees, plus a property test over random update orders.

use engram::prelude::*;
use engram::sync::types::{Change, DeltaOperation, PullRequest, PushRequest};
use engram::UserId;
use proptest::prelude::*;
use serde_json::json;
use tempfile::tempdir;

fn open_db() -> (Engram, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Engram::open(dir.path().join("test.db"), Config::default()).unwrap();
    (db, dir)
}

fn register(db: &Engram, email: &str) -> UserId {
    db.register_user(email, "hash").unwrap().id
}

fn push_one(db: &Engram, user: &UserId, device: &str, change: Change) -> engram::sync::types::PushResponse {
    db.push(
        user,
        PushRequest {
            device_id: DeviceId::new(device),
            changes: vec![change],
        },
    )
    .unwrap()
}

fn note_upsert(id: &str, body: &str, updated: &str) -> Change {
    Change {
        entity_type: "note".to_string(),
        entity_id: id.to_string(),
        operation: "update".to_string(),
        payload: json!({
            "body": body,
            "importance": 3,
            "created_at": "2025-01-06T08:00:00Z",
            "updated_at": updated,
        }),
    }
}

fn note_delete(id: &str, deleted: &str) -> Change {
    Change {
        entity_type: "note".to_string(),
        entity_id: id.to_string(),
        operation: "delete".to_string(),
        payload: json!({"deleted_at": deleted}),
    }
}

// ============================================================================
// Two-device scenarios
// ============================================================================

#[test]
fn test_two_device_lww_on_notes() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");
    let note = NoteId::new("N1");

    // Device A creates v1 at 10:00
    let r = push_one(&db, &user, "device-a", note_upsert("N1", "v1", "2025-01-06T10:00:00Z"));
    assert_eq!(r.success_count, 1);

    // Device B updates to v2 at 10:30
    let r = push_one(&db, &user, "device-b", note_upsert("N1", "v2", "2025-01-06T10:30:00Z"));
    assert_eq!(r.success_count, 1);

    // Device A pushes a stale v3 stamped 09:00: dropped, but reported success
    let r = push_one(&db, &user, "device-a", note_upsert("N1", "v3", "2025-01-06T09:00:00Z"));
    assert_eq!(r.success_count, 1);

    let stored = db.get_note(&user, &note).unwrap().unwrap();
    assert_eq!(stored.body, "v2");
}

#[test]
fn test_delete_wins_over_stale_update() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    // N2 exists at 09:00
    push_one(&db, &user, "d1", note_upsert("N2", "initial", "2025-01-06T09:00:00Z"));

    // Update at 10:00 applies
    push_one(&db, &user, "d1", note_upsert("N2", "x", "2025-01-06T10:00:00Z"));

    // Delete at 10:30 applies
    let r = push_one(&db, &user, "d2", note_delete("N2", "2025-01-06T10:30:00Z"));
    assert_eq!(r.success_count, 1);

    // Update at 10:15 is older than the tombstone: dropped
    let r = push_one(&db, &user, "d1", note_upsert("N2", "y", "2025-01-06T10:15:00Z"));
    assert_eq!(r.success_count, 1);

    let stored = db.get_note(&user, &NoteId::new("N2")).unwrap().unwrap();
    assert!(stored.is_deleted());
    assert_ne!(stored.body, "y");

    // The pull stream reports the note as a delete with null data
    let pulled = db
        .pull(
            &user,
            PullRequest {
                device_id: DeviceId::new("d3"),
                checkpoint: None,
            },
        )
        .unwrap();
    let delta = pulled.changes.iter().find(|d| d.entity_id == "N2").unwrap();
    assert_eq!(delta.operation, DeltaOperation::Delete);
    assert!(delta.data.is_none());
}

#[test]
fn test_update_newer_than_tombstone_resurrects() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_one(&db, &user, "d1", note_upsert("N1", "alive", "2025-01-06T10:00:00Z"));
    push_one(&db, &user, "d1", note_delete("N1", "2025-01-06T11:00:00Z"));

    // Newer than the tombstone: resurrection
    let r = push_one(&db, &user, "d2", note_upsert("N1", "back", "2025-01-06T12:00:00Z"));
    assert_eq!(r.success_count, 1);

    let stored = db.get_note(&user, &NoteId::new("N1")).unwrap().unwrap();
    assert!(!stored.is_deleted());
    assert_eq!(stored.body, "back");
}

#[test]
fn test_update_older_than_tombstone_does_not_resurrect() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_one(&db, &user, "d1", note_upsert("N1", "alive", "2025-01-06T10:00:00Z"));
    push_one(&db, &user, "d1", note_delete("N1", "2025-01-06T11:00:00Z"));

    let r = push_one(&db, &user, "d2", note_upsert("N1", "late", "2025-01-06T10:30:00Z"));
    assert_eq!(r.success_count, 1);

    let stored = db.get_note(&user, &NoteId::new("N1")).unwrap().unwrap();
    assert!(stored.is_deleted());
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_push_idempotence_for_notes() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    let change = note_upsert("N1", "same", "2025-01-06T10:00:00Z");
    push_one(&db, &user, "d1", change.clone());
    let before = db.get_note(&user, &NoteId::new("N1")).unwrap().unwrap();

    // Replaying the identical change is dropped by the strict comparison
    let r = push_one(&db, &user, "d1", change);
    assert_eq!(r.success_count, 1);

    let after = db.get_note(&user, &NoteId::new("N1")).unwrap().unwrap();
    assert_eq!(after.body, before.body);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.server_timestamp, before.server_timestamp);
}

#[test]
fn test_relation_insert_idempotent() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_one(&db, &user, "d1", note_upsert("n1", "one", "2025-01-06T10:00:00Z"));
    push_one(&db, &user, "d1", note_upsert("n2", "two", "2025-01-06T10:00:00Z"));

    let relation = Change {
        entity_type: "relation".to_string(),
        entity_id: "r1".to_string(),
        operation: "insert".to_string(),
        payload: json!({
            "from_note_id": "n1",
            "to_note_id": "n2",
            "relation_type": "supports",
            "created_at": "2025-01-06T10:05:00Z",
        }),
    };

    let r = push_one(&db, &user, "d1", relation.clone());
    assert_eq!(r.success_count, 1);
    let r = push_one(&db, &user, "d2", relation);
    assert_eq!(r.success_count, 1);

    let pulled = db
        .pull(
            &user,
            PullRequest {
                device_id: DeviceId::new("d3"),
                checkpoint: None,
            },
        )
        .unwrap();
    let relations: Vec<_> = pulled
        .changes
        .iter()
        .filter(|d| d.entity_id == "r1")
        .collect();
    assert_eq!(relations.len(), 1);
}

#[test]
fn test_equal_updated_at_first_write_wins() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_one(&db, &user, "d1", note_upsert("N1", "first", "2025-01-06T10:00:00Z"));
    let r = push_one(&db, &user, "d2", note_upsert("N1", "second", "2025-01-06T10:00:00Z"));
    assert_eq!(r.success_count, 1);

    let stored = db.get_note(&user, &NoteId::new("N1")).unwrap().unwrap();
    assert_eq!(stored.body, "first");
}

// ============================================================================
// Reflections under LWW
// ============================================================================

fn reflection_upsert(date: &str, content: &str, updated: &str) -> Change {
    Change {
        entity_type: "reflection".to_string(),
        entity_id: date.to_string(),
        operation: "update".to_string(),
        payload: json!({
            "date": date,
            "content": content,
            "created_at": "2025-01-06T08:00:00Z",
            "updated_at": updated,
        }),
    }
}

#[test]
fn test_reflection_lww() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_one(&db, &user, "d1", reflection_upsert("2025-01-06", "v1", "2025-01-06T20:00:00Z"));
    push_one(&db, &user, "d2", reflection_upsert("2025-01-06", "v2", "2025-01-06T21:00:00Z"));
    let r = push_one(&db, &user, "d1", reflection_upsert("2025-01-06", "v0", "2025-01-06T19:00:00Z"));
    assert_eq!(r.success_count, 1);

    let stored = db.get_reflection(&user, "2025-01-06").unwrap().unwrap();
    assert_eq!(stored.content, "v2");
}

// ============================================================================
// Server timestamp guarantees
// ============================================================================

#[test]
fn test_server_timestamp_strictly_increases_per_note() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    let mut previous = None;
    for i in 1..=5 {
        let updated = format!("2025-01-06T10:0{i}:00Z");
        push_one(&db, &user, "d1", note_upsert("N1", &format!("v{i}"), &updated));
        let stored = db.get_note(&user, &NoteId::new("N1")).unwrap().unwrap();
        if let Some(previous) = previous {
            assert!(
                stored.server_timestamp > previous,
                "server_timestamp must advance on every accepted write"
            );
        }
        previous = Some(stored.server_timestamp);
    }
}

// ============================================================================
// Property: final state carries the maximum updated_at
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_final_body_has_max_updated_at(timestamps in proptest::collection::vec(0u32..500, 1..8)) {
        let (db, _dir) = open_db();
        let user = register(&db, "prop@example.com");

        // Client timestamps arrive in arbitrary order; duplicates lose the
        // strict comparison and drop (they carry the same body anyway)
        let base = 1_736_150_400_000i64; // 2025-01-06T08:00:00Z
        for ts in &timestamps {
            let updated = Timestamp::from_millis(base + *ts as i64 * 1000).to_rfc3339();
            let r = push_one(&db, &user, "d1", note_upsert("N1", &format!("b{ts}"), &updated));
            prop_assert_eq!(r.success_count, 1);
        }

        let max_ts = timestamps.iter().max().copied().unwrap();
        let stored = db.get_note(&user, &NoteId::new("N1")).unwrap().unwrap();
        prop_assert_eq!(stored.body, format!("b{}", max_ts));
    }
}
