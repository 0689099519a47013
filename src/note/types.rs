//! Data types for notes.
//!
//! A note is the primary user-authored entity: free-form text with an
//! importance rating, optional source attachment fields, a derived semantic
//! embedding, and the timestamp triple that drives sync conflict resolution.

use serde::{Deserialize, Serialize};

use crate::types::{Embedding, NoteId, Timestamp, UserId};

/// A stored note.
///
/// Notes are soft-deleted: `deleted_at` marks the row as a tombstone that
/// keeps flowing through pull responses so every device converges on the
/// deletion. The `embedding` is `None` only when derivation failed for the
/// latest accepted body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    /// Client-assigned unique identifier.
    pub id: NoteId,

    /// Owning user. Enforced on every read and write.
    pub user_id: UserId,

    /// Note text.
    pub body: String,

    /// Importance rating, 1 (low) to 5 (high).
    pub importance: u8,

    /// Optional URL the note was captured from.
    pub source_url: Option<String>,

    /// Optional path of an attached image.
    pub image_path: Option<String>,

    /// Derived semantic embedding; `None` when generation failed.
    pub embedding: Option<Embedding>,

    /// Client-reported creation time.
    pub created_at: Timestamp,

    /// Client-reported modification time; the last-writer-wins pivot.
    pub updated_at: Timestamp,

    /// Soft-delete marker. When set, it is >= `updated_at`.
    pub deleted_at: Option<Timestamp>,

    /// Server-assigned write time, strictly increasing per note.
    pub server_timestamp: Timestamp,
}

impl Note {
    /// Returns true if this note has been soft-deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Importance bounds for note payload validation.
pub const MIN_IMPORTANCE: u8 = 1;
/// Upper importance bound.
pub const MAX_IMPORTANCE: u8 = 5;
