//! Integration tests for the pull half of the sync protocol.
//!
//! Covers initial sync, checkpoint advancement and convergence, paging,
//! user isolation, and delta shapes.

use engram::prelude::*;
use engram::sync::types::{Change, DeltaOperation, EntityType, PullRequest, PushRequest};
use engram::UserId;
use serde_json::json;
use tempfile::tempdir;

fn open_db_with(config: Config) -> (Engram, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Engram::open(dir.path().join("test.db"), config).unwrap();
    (db, dir)
}

fn open_db() -> (Engram, tempfile::TempDir) {
    open_db_with(Config::default())
}

fn register(db: &Engram, email: &str) -> UserId {
    db.register_user(email, "hash").unwrap().id
}

fn push_notes(db: &Engram, user: &UserId, ids: &[&str]) {
    let changes = ids
        .iter()
        .map(|id| Change {
            entity_type: "note".to_string(),
            entity_id: id.to_string(),
            operation: "insert".to_string(),
            payload: json!({
                "body": format!("body of {id}"),
                "importance": 3,
                "created_at": "2025-01-06T10:00:00Z",
                "updated_at": "2025-01-06T10:00:00Z",
            }),
        })
        .collect();
    let response = db
        .push(
            user,
            PushRequest {
                device_id: DeviceId::new("d1"),
                changes,
            },
        )
        .unwrap();
    assert_eq!(response.failure_count, 0);
}

fn pull(db: &Engram, user: &UserId, checkpoint: Option<String>) -> engram::sync::types::PullResponse {
    db.pull(
        user,
        PullRequest {
            device_id: DeviceId::new("d1"),
            checkpoint,
        },
    )
    .unwrap()
}

// ============================================================================
// Initial sync and convergence
// ============================================================================

#[test]
fn test_initial_pull_returns_everything() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1", "n2", "n3"]);

    let response = pull(&db, &user, None);
    assert_eq!(response.total_changes, 3);
    assert!(!response.has_more);

    // Ordered by server timestamp ascending
    let timestamps: Vec<Timestamp> = response.changes.iter().map(|d| d.server_timestamp).collect();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
}

#[test]
fn test_pull_converges_to_empty() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1", "n2"]);

    let first = pull(&db, &user, None);
    assert_eq!(first.total_changes, 2);

    // No new writes: the next pull from the returned checkpoint is empty
    let second = pull(&db, &user, Some(first.new_checkpoint.clone()));
    assert_eq!(second.total_changes, 0);
    assert!(!second.has_more);
    assert_eq!(second.new_checkpoint, first.new_checkpoint);
}

#[test]
fn test_pull_returns_only_rows_past_checkpoint() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1"]);
    let first = pull(&db, &user, None);

    push_notes(&db, &user, &["n2"]);
    let second = pull(&db, &user, Some(first.new_checkpoint));

    assert_eq!(second.total_changes, 1);
    assert_eq!(second.changes[0].entity_id, "n2");
}

#[test]
fn test_future_checkpoint_returns_empty() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1"]);

    let future = Timestamp::from_millis(Timestamp::now().as_millis() + 86_400_000);
    let response = pull(&db, &user, Some(future.to_rfc3339()));

    assert_eq!(response.total_changes, 0);
    // The input checkpoint comes back unchanged
    assert_eq!(response.new_checkpoint, future.to_rfc3339());
}

#[test]
fn test_malformed_checkpoint_rejected() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    let err = db
        .pull(
            &user,
            PullRequest {
                device_id: DeviceId::new("d1"),
                checkpoint: Some("not-a-timestamp".to_string()),
            },
        )
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_empty_database_initial_pull() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    let response = pull(&db, &user, None);
    assert_eq!(response.total_changes, 0);
    assert!(!response.has_more);
    // Epoch checkpoint keeps the next pull a full rescan
    assert_eq!(response.new_checkpoint, "1970-01-01T00:00:00.000Z");
}

// ============================================================================
// Paging
// ============================================================================

#[test]
fn test_paging_sets_has_more_until_drained() {
    let (db, _dir) = open_db_with(Config {
        pull_page_size: 2,
        ..Default::default()
    });
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1", "n2", "n3"]);

    let first = pull(&db, &user, None);
    assert_eq!(first.total_changes, 2);
    assert!(first.has_more);

    let second = pull(&db, &user, Some(first.new_checkpoint));
    assert_eq!(second.total_changes, 1);
    assert!(!second.has_more);

    let third = pull(&db, &user, Some(second.new_checkpoint));
    assert_eq!(third.total_changes, 0);
}

// ============================================================================
// Delta shapes
// ============================================================================

#[test]
fn test_upsert_delta_carries_full_note() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1"]);

    let response = pull(&db, &user, None);
    let delta = &response.changes[0];
    assert_eq!(delta.entity_type, EntityType::Note);
    assert_eq!(delta.operation, DeltaOperation::Upsert);

    let data = delta.data.as_ref().unwrap();
    assert_eq!(data["id"], "n1");
    assert_eq!(data["body"], "body of n1");
    assert_eq!(data["importance"], 3);
    assert!(data["deleted_at"].is_null());
}

#[test]
fn test_deleted_note_pulls_as_delete_with_null_data() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1"]);

    let delete = Change {
        entity_type: "note".to_string(),
        entity_id: "n1".to_string(),
        operation: "delete".to_string(),
        payload: json!({"deleted_at": "2025-01-06T12:00:00Z"}),
    };
    db.push(
        &user,
        PushRequest {
            device_id: DeviceId::new("d1"),
            changes: vec![delete],
        },
    )
    .unwrap();

    let response = pull(&db, &user, None);
    assert_eq!(response.total_changes, 1);
    let delta = &response.changes[0];
    assert_eq!(delta.operation, DeltaOperation::Delete);
    assert!(delta.data.is_none());
    assert_eq!(delta.entity_id, "n1");
}

#[test]
fn test_relation_and_reflection_deltas() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    push_notes(&db, &user, &["n1", "n2"]);

    let changes = vec![
        Change {
            entity_type: "relation".to_string(),
            entity_id: "r1".to_string(),
            operation: "insert".to_string(),
            payload: json!({
                "from_note_id": "n1",
                "to_note_id": "n2",
                "relation_type": "elaborates",
                "created_at": "2025-01-06T12:00:00Z",
            }),
        },
        Change {
            entity_type: "reflection".to_string(),
            entity_id: "2025-01-06".to_string(),
            operation: "insert".to_string(),
            payload: json!({
                "date": "2025-01-06",
                "content": "daily reflection",
                "created_at": "2025-01-06T21:00:00Z",
                "updated_at": "2025-01-06T21:00:00Z",
            }),
        },
    ];
    db.push(
        &user,
        PushRequest {
            device_id: DeviceId::new("d1"),
            changes,
        },
    )
    .unwrap();

    let response = pull(&db, &user, None);
    assert_eq!(response.total_changes, 4);

    let relation = response
        .changes
        .iter()
        .find(|d| d.entity_type == EntityType::Relation)
        .unwrap();
    assert_eq!(relation.operation, DeltaOperation::Upsert);
    assert_eq!(relation.data.as_ref().unwrap()["relation_type"], "elaborates");

    let reflection = response
        .changes
        .iter()
        .find(|d| d.entity_type == EntityType::Reflection)
        .unwrap();
    assert_eq!(reflection.entity_id, "2025-01-06");
    assert_eq!(reflection.data.as_ref().unwrap()["content"], "daily reflection");
}

// ============================================================================
// User isolation
// ============================================================================

#[test]
fn test_pull_is_scoped_to_the_user() {
    let (db, _dir) = open_db();
    let alice = register(&db, "alice@example.com");
    let bob = register(&db, "bob@example.com");

    push_notes(&db, &alice, &["a1", "a2"]);
    push_notes(&db, &bob, &["b1"]);

    let response = pull(&db, &alice, None);
    let mut ids: Vec<&str> = response.changes.iter().map(|d| d.entity_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a1", "a2"]);

    let response = pull(&db, &bob, None);
    let ids: Vec<&str> = response.changes.iter().map(|d| d.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["b1"]);
}

#[test]
fn test_push_then_pull_round_trip_state() {
    let (db, _dir) = open_db();
    let user = register(&db, "a@example.com");

    let pre_push = pull(&db, &user, None);

    push_notes(&db, &user, &["n1", "n2"]);

    // Pulling from the pre-push checkpoint reproduces the pushed state
    let checkpoint = if pre_push.total_changes == 0 {
        None
    } else {
        Some(pre_push.new_checkpoint)
    };
    let response = pull(&db, &user, checkpoint);

    let mut ids: Vec<&str> = response.changes.iter().map(|d| d.entity_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["n1", "n2"]);
    for delta in &response.changes {
        assert_eq!(delta.operation, DeltaOperation::Upsert);
    }
}
