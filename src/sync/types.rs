//! Wire types for the push/pull sync protocol.
//!
//! Push payloads vary by `(entity_type, operation)`. They arrive as raw
//! JSON inside the envelope and are decoded into one concrete shape per
//! combination by [`TypedChange::decode`]; unknown combinations fail that
//! item with a validation error while the rest of the batch proceeds.
//!
//! All wire timestamps are RFC 3339 strings; decoding normalizes them to
//! UTC-millisecond [`Timestamp`]s.

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, ValidationError};
use crate::relation::RelationKind;
use crate::types::{DeviceId, Timestamp};

/// RFC 3339 (de)serialization for required timestamps on the wire.
pub(crate) mod ts_rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::Timestamp;

    pub fn serialize<S: Serializer>(ts: &Timestamp, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(d)?;
        Timestamp::parse_rfc3339(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC 3339 timestamp '{raw}'")))
    }
}

/// RFC 3339 (de)serialization for optional timestamps on the wire.
pub(crate) mod ts_rfc3339_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::Timestamp;

    pub fn serialize<S: Serializer>(ts: &Option<Timestamp>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&ts.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw {
            None => Ok(None),
            Some(raw) => Timestamp::parse_rfc3339(&raw).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid RFC 3339 timestamp '{raw}'"))
            }),
        }
    }
}

/// One change in a push batch, payload still undecoded.
///
/// `entity_type` and `operation` stay plain strings here so that an unknown
/// value fails only its own item during [`TypedChange::decode`], not the
/// whole envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Change {
    /// Entity kind: `note`, `relation`, or `reflection`.
    pub entity_type: String,

    /// Client-assigned entity id (for reflections, the date).
    pub entity_id: String,

    /// Operation: `insert`, `update`, or `delete`.
    pub operation: String,

    /// Operation payload; shape depends on `(entity_type, operation)`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Note insert/update payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotePayload {
    /// Note text (may be empty).
    pub body: String,

    /// Importance rating, 1..=5.
    pub importance: u8,

    /// Optional capture URL.
    #[serde(default)]
    pub source_url: Option<String>,

    /// Optional attached image path.
    #[serde(default)]
    pub image_path: Option<String>,

    /// Client creation time.
    #[serde(with = "ts_rfc3339")]
    pub created_at: Timestamp,

    /// Client modification time (the LWW pivot).
    #[serde(with = "ts_rfc3339")]
    pub updated_at: Timestamp,

    /// Optional tombstone carried by upsert (clears on resurrection).
    #[serde(default, with = "ts_rfc3339_opt")]
    pub deleted_at: Option<Timestamp>,
}

/// Note delete payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NoteDeletePayload {
    /// Deletion time; the server substitutes now when absent.
    #[serde(default, with = "ts_rfc3339_opt")]
    pub deleted_at: Option<Timestamp>,
}

/// Relation insert payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationPayload {
    /// Source note id.
    pub from_note_id: String,

    /// Target note id.
    pub to_note_id: String,

    /// Relationship type.
    pub relation_type: RelationKind,

    /// Client creation time.
    #[serde(with = "ts_rfc3339")]
    pub created_at: Timestamp,
}

/// Reflection insert/update payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReflectionPayload {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,

    /// Reflection text.
    pub content: String,

    /// Client creation time.
    #[serde(with = "ts_rfc3339")]
    pub created_at: Timestamp,

    /// Client modification time (the LWW pivot).
    #[serde(with = "ts_rfc3339")]
    pub updated_at: Timestamp,
}

/// A change decoded into its concrete per-operation shape.
#[derive(Clone, Debug)]
pub enum TypedChange {
    /// Note insert or update (identical upsert semantics).
    NoteUpsert(NotePayload),
    /// Note soft delete.
    NoteDelete(NoteDeletePayload),
    /// Relation insert (idempotent on id).
    RelationInsert(RelationPayload),
    /// Relation hard delete (empty payload).
    RelationDelete,
    /// Reflection insert or update (identical upsert semantics).
    ReflectionUpsert(ReflectionPayload),
    /// Reflection hard delete; the date defaults to the change's entity id.
    ReflectionDelete {
        /// Explicit date override from the payload, if any.
        date: Option<String>,
    },
}

impl TypedChange {
    /// Decodes a raw change into its typed shape.
    ///
    /// Unknown entity types, unknown operations, and payloads missing
    /// required fields all produce validation errors that fail this item
    /// only.
    pub fn decode(change: &Change) -> Result<Self, EngramError> {
        match (change.entity_type.as_str(), change.operation.as_str()) {
            ("note", "insert") | ("note", "update") => {
                Ok(Self::NoteUpsert(decode_payload(&change.payload)?))
            }
            ("note", "delete") => {
                if change.payload.is_null() {
                    Ok(Self::NoteDelete(NoteDeletePayload::default()))
                } else {
                    Ok(Self::NoteDelete(decode_payload(&change.payload)?))
                }
            }
            ("relation", "insert") => {
                Ok(Self::RelationInsert(decode_payload(&change.payload)?))
            }
            ("relation", "delete") => Ok(Self::RelationDelete),
            ("relation", op) => Err(ValidationError::invalid_field(
                "operation",
                format!("unknown operation for relation: {op}"),
            )
            .into()),
            ("reflection", "insert") | ("reflection", "update") => {
                Ok(Self::ReflectionUpsert(decode_payload(&change.payload)?))
            }
            ("reflection", "delete") => {
                let date = change
                    .payload
                    .get("date")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned);
                Ok(Self::ReflectionDelete { date })
            }
            ("note", op) | ("reflection", op) => Err(ValidationError::invalid_field(
                "operation",
                format!("unknown operation: {op}"),
            )
            .into()),
            (entity, _) => Err(ValidationError::invalid_field(
                "entity_type",
                format!("unknown entity type: {entity}"),
            )
            .into()),
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    payload: &serde_json::Value,
) -> Result<T, EngramError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| ValidationError::malformed_payload(e.to_string()).into())
}

/// Push request envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushRequest {
    /// Device issuing the batch.
    pub device_id: DeviceId,

    /// Changes in client order; 1..=100 items, at most 1 MiB encoded.
    pub changes: Vec<Change>,
}

/// Per-item push outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemResult {
    /// Entity id from the corresponding change.
    pub entity_id: String,

    /// Whether the item was applied (or deliberately dropped by LWW).
    pub success: bool,

    /// Error description when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
}

/// Push response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushResponse {
    /// Number of items that succeeded.
    pub success_count: usize,

    /// Number of items that failed.
    pub failure_count: usize,

    /// Per-item results in the order the changes were supplied.
    pub results: Vec<ItemResult>,

    /// Checkpoint covering every write this push committed.
    pub new_checkpoint: String,
}

/// Pull request envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullRequest {
    /// Device issuing the pull.
    pub device_id: DeviceId,

    /// Last checkpoint the device applied; `None` requests everything.
    #[serde(default)]
    pub checkpoint: Option<String>,
}

/// Entity kind tag in pull deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Note row.
    Note,
    /// Relation row.
    Relation,
    /// Reflection row.
    Reflection,
}

/// Delta operation tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaOperation {
    /// Create-or-replace with the row in `data`.
    Upsert,
    /// Remove the row; `data` is null.
    Delete,
}

/// One element of a pull response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Delta {
    /// Entity kind.
    pub entity_type: EntityType,

    /// Entity id (for reflections, the date).
    pub entity_id: String,

    /// Upsert or delete.
    pub operation: DeltaOperation,

    /// Full entity payload for upserts, `null` for deletes.
    pub data: Option<serde_json::Value>,

    /// Entity modification time.
    #[serde(with = "ts_rfc3339")]
    pub updated_at: Timestamp,

    /// Server write time that ordered this delta.
    #[serde(with = "ts_rfc3339")]
    pub server_timestamp: Timestamp,
}

/// Pull response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullResponse {
    /// True when any per-type page cap was saturated; pull again.
    pub has_more: bool,

    /// Deltas ordered by `server_timestamp` within each entity type.
    pub changes: Vec<Delta>,

    /// Checkpoint to resume from.
    pub new_checkpoint: String,

    /// Number of deltas in this response.
    pub total_changes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(entity_type: &str, operation: &str, payload: serde_json::Value) -> Change {
        Change {
            entity_type: entity_type.to_string(),
            entity_id: "e1".to_string(),
            operation: operation.to_string(),
            payload,
        }
    }

    #[test]
    fn test_decode_note_insert() {
        let c = change(
            "note",
            "insert",
            json!({
                "body": "hello",
                "importance": 3,
                "created_at": "2025-01-10T10:00:00Z",
                "updated_at": "2025-01-10T10:00:00Z"
            }),
        );
        match TypedChange::decode(&c).unwrap() {
            TypedChange::NoteUpsert(p) => {
                assert_eq!(p.body, "hello");
                assert_eq!(p.importance, 3);
                assert!(p.deleted_at.is_none());
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn test_decode_note_update_same_shape_as_insert() {
        let c = change(
            "note",
            "update",
            json!({
                "body": "x",
                "importance": 1,
                "created_at": "2025-01-10T10:00:00Z",
                "updated_at": "2025-01-10T11:00:00Z"
            }),
        );
        assert!(matches!(
            TypedChange::decode(&c).unwrap(),
            TypedChange::NoteUpsert(_)
        ));
    }

    #[test]
    fn test_decode_note_missing_field_fails() {
        let c = change("note", "insert", json!({"body": "hello"}));
        let err = TypedChange::decode(&c).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_decode_note_delete_empty_payload() {
        let c = change("note", "delete", serde_json::Value::Null);
        match TypedChange::decode(&c).unwrap() {
            TypedChange::NoteDelete(p) => assert!(p.deleted_at.is_none()),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn test_decode_note_delete_with_timestamp() {
        let c = change("note", "delete", json!({"deleted_at": "2025-01-10T10:30:00Z"}));
        match TypedChange::decode(&c).unwrap() {
            TypedChange::NoteDelete(p) => assert!(p.deleted_at.is_some()),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn test_decode_relation_insert() {
        let c = change(
            "relation",
            "insert",
            json!({
                "from_note_id": "n1",
                "to_note_id": "n2",
                "relation_type": "related_to",
                "created_at": "2025-01-10T10:00:00Z"
            }),
        );
        match TypedChange::decode(&c).unwrap() {
            TypedChange::RelationInsert(p) => {
                assert_eq!(p.from_note_id, "n1");
                assert_eq!(p.relation_type, RelationKind::RelatedTo);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn test_decode_relation_update_rejected() {
        let c = change("relation", "update", json!({}));
        assert!(TypedChange::decode(&c).is_err());
    }

    #[test]
    fn test_decode_reflection_upsert() {
        let c = change(
            "reflection",
            "insert",
            json!({
                "date": "2025-01-10",
                "content": "today",
                "created_at": "2025-01-10T10:00:00Z",
                "updated_at": "2025-01-10T10:00:00Z"
            }),
        );
        assert!(matches!(
            TypedChange::decode(&c).unwrap(),
            TypedChange::ReflectionUpsert(_)
        ));
    }

    #[test]
    fn test_decode_reflection_delete_date_fallback() {
        let c = change("reflection", "delete", serde_json::Value::Null);
        match TypedChange::decode(&c).unwrap() {
            TypedChange::ReflectionDelete { date } => assert!(date.is_none()),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_entity_type() {
        let c = change("widget", "insert", json!({}));
        let err = TypedChange::decode(&c).unwrap_err();
        assert!(err.to_string().contains("unknown entity type"));
    }

    #[test]
    fn test_decode_unknown_operation() {
        let c = change("note", "upsert", json!({}));
        let err = TypedChange::decode(&c).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_decode_bad_timestamp_fails() {
        let c = change(
            "note",
            "insert",
            json!({
                "body": "x",
                "importance": 3,
                "created_at": "yesterday",
                "updated_at": "2025-01-10T10:00:00Z"
            }),
        );
        assert!(TypedChange::decode(&c).is_err());
    }

    #[test]
    fn test_delta_serializes_rfc3339() {
        let delta = Delta {
            entity_type: EntityType::Note,
            entity_id: "n1".to_string(),
            operation: DeltaOperation::Delete,
            data: None,
            updated_at: Timestamp::from_millis(0),
            server_timestamp: Timestamp::from_millis(0),
        };
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["entity_type"], "note");
        assert_eq!(json["operation"], "delete");
        assert_eq!(json["updated_at"], "1970-01-01T00:00:00.000Z");
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_push_request_roundtrip() {
        let req = PushRequest {
            device_id: DeviceId::new("d1"),
            changes: vec![change("note", "delete", serde_json::Value::Null)],
        };
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: PushRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.changes.len(), 1);
        assert_eq!(decoded.device_id.as_str(), "d1");
    }
}
