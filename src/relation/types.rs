//! Data types for inter-note relations.
//!
//! Relations connect two notes owned by the same user, forming a directed
//! multigraph that clients render as a knowledge map. Cycles are permitted;
//! the server never computes transitive closure at write time.

use serde::{Deserialize, Serialize};

use crate::types::{NoteId, RelationId, Timestamp, UserId};

/// Type of relationship between two notes.
///
/// Relations are directed: the semantics describe how the **from** note
/// relates to the **to** note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// From-note supports or reinforces the to-note.
    Supports,
    /// From-note contradicts the to-note.
    Contradicts,
    /// From-note elaborates on or adds detail to the to-note.
    Elaborates,
    /// From-note supersedes or replaces the to-note.
    Supersedes,
    /// From-note cites the to-note as a source.
    References,
    /// General relationship with no specific semantics.
    RelatedTo,
}

/// A stored relationship between two notes.
///
/// Relations are immutable once written: there is no update operation, and
/// delete removes the row entirely (no tombstone). The owning `user_id` is
/// denormalized from the from-note so ownership checks on pull never need a
/// join.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Relation {
    /// Client-assigned unique identifier.
    pub id: RelationId,

    /// Owner (the from-note's owner).
    pub user_id: UserId,

    /// The note this relation originates from.
    pub from_note_id: NoteId,

    /// The note this relation points to.
    pub to_note_id: NoteId,

    /// The type of relationship.
    pub relation_type: RelationKind,

    /// Client-reported creation time.
    pub created_at: Timestamp,

    /// Server-assigned write time.
    pub server_timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind_bincode_roundtrip() {
        let kinds = [
            RelationKind::Supports,
            RelationKind::Contradicts,
            RelationKind::Elaborates,
            RelationKind::Supersedes,
            RelationKind::References,
            RelationKind::RelatedTo,
        ];
        for kind in &kinds {
            let bytes = bincode::serialize(kind).unwrap();
            let restored: RelationKind = bincode::deserialize(&bytes).unwrap();
            assert_eq!(*kind, restored);
        }
    }

    #[test]
    fn test_relation_kind_wire_form() {
        let json = serde_json::to_string(&RelationKind::RelatedTo).unwrap();
        assert_eq!(json, "\"related_to\"");
        let parsed: RelationKind = serde_json::from_str("\"supports\"").unwrap();
        assert_eq!(parsed, RelationKind::Supports);
    }

    #[test]
    fn test_relation_bincode_roundtrip() {
        let relation = Relation {
            id: RelationId::new("r1"),
            user_id: UserId::new("u1"),
            from_note_id: NoteId::new("n1"),
            to_note_id: NoteId::new("n2"),
            relation_type: RelationKind::Elaborates,
            created_at: Timestamp::from_millis(1000),
            server_timestamp: Timestamp::from_millis(1500),
        };

        let bytes = bincode::serialize(&relation).unwrap();
        let restored: Relation = bincode::deserialize(&bytes).unwrap();

        assert_eq!(relation.id, restored.id);
        assert_eq!(relation.from_note_id, restored.from_note_id);
        assert_eq!(relation.to_note_id, restored.to_note_id);
        assert_eq!(relation.relation_type, restored.relation_type);
    }
}
