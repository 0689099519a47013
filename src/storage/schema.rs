//! Database schema definitions and versioning.
//!
//! This module defines the table structure for the redb storage engine.
//! All table definitions are compile-time constants to ensure consistency.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the metadata table. When opening an
//! existing database, we check the version and fail if it doesn't match.
//! Migration support will be added in a future release.
//!
//! # Key Encoding
//!
//! Entity ids are client-assigned strings, so composite keys cannot be
//! fixed-size arrays. Two encodings are used:
//!
//! - Per-user delta indexes are multimaps `user_id → [server_ts BE 8][id]`;
//!   big-endian timestamps make lexicographic value order equal time order,
//!   with the id as a stable tie-break.
//! - Rows addressed by `(user_id, suffix)` pairs (reflections, weekly
//!   reports) use a length-prefixed key `[len(user_id) BE 4][user_id][suffix]`
//!   so no separator byte can collide with id contents.

use redb::{MultimapTableDefinition, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The database will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for database-level information.
///
/// Entries: `"db_metadata"` -> [`DatabaseMetadata`] (bincode),
/// `"next_keyword_id"` -> u64 little-endian counter.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Users table. Key: user id. Value: bincode-serialized `User`.
pub const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique-email index. Key: email (case-exact). Value: user id.
pub const USERS_BY_EMAIL_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_email");

/// Notes table. Key: note id. Value: bincode-serialized `Note`
/// with the embedding stripped (it lives in `note_embeddings`).
pub const NOTES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("notes");

/// Note embeddings, stored separately to keep the main table compact.
/// Key: note id. Value: raw little-endian f32 bytes (dimension * 4).
pub const NOTE_EMBEDDINGS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("note_embeddings");

/// Index: notes by user and server timestamp.
///
/// Key: user id. Value: `[server_ts BE 8][note_id]`.
/// Iterating a key's values yields the user's notes in server-write order,
/// which is exactly the pull scan.
pub const NOTES_BY_USER_TABLE: MultimapTableDefinition<&str, &[u8]> =
    MultimapTableDefinition::new("notes_by_user");

/// Relations table. Key: relation id. Value: bincode-serialized `Relation`.
pub const RELATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("relations");

/// Index: relations by user and server timestamp (same value encoding as
/// `notes_by_user`).
pub const RELATIONS_BY_USER_TABLE: MultimapTableDefinition<&str, &[u8]> =
    MultimapTableDefinition::new("relations_by_user");

/// Reflections table. Key: `scoped_key(user_id, date)`.
/// Value: bincode-serialized `Reflection`.
pub const REFLECTIONS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("reflections");

/// Index: reflections by user and server timestamp; the id portion of the
/// value is the reflection's date.
pub const REFLECTIONS_BY_USER_TABLE: MultimapTableDefinition<&str, &[u8]> =
    MultimapTableDefinition::new("reflections_by_user");

/// Keyword rows by name (the uniqueness side). Key: keyword name
/// (case-sensitive). Value: server-assigned keyword id.
pub const KEYWORDS_BY_NAME_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("keywords_by_name");

/// Reverse keyword lookup. Key: keyword id. Value: keyword name.
pub const KEYWORD_NAMES_TABLE: TableDefinition<u64, &str> =
    TableDefinition::new("keyword_names");

/// Note↔keyword links. Key: note id.
/// Value: `[keyword_id BE 8][score f32 bits BE 4]`.
/// Composite uniqueness on (note, keyword) falls out of the multimap
/// treating identical values as one entry.
pub const NOTE_KEYWORDS_TABLE: MultimapTableDefinition<&str, &[u8]> =
    MultimapTableDefinition::new("note_keywords");

/// Weekly report cache. Key: `scoped_key(user_id, week_key)`.
/// Value: the JSON report blob, returned byte-for-byte on cache hits.
pub const REPORTS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("weekly_reports");

// ============================================================================
// Database Metadata
// ============================================================================

/// Database metadata stored in the metadata table.
///
/// This is serialized with bincode and stored under the key "db_metadata".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Embedding dimension configured for this database.
    ///
    /// Once set, this cannot be changed without recreating the database.
    pub embedding_dimension: usize,

    /// Timestamp when the database was created.
    pub created_at: Timestamp,

    /// Last time the database was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    /// Creates new metadata for a fresh database.
    pub fn new(embedding_dimension: usize) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            embedding_dimension,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

// ============================================================================
// Key Encoding Helpers
// ============================================================================

/// Encodes a `[server_ts BE 8][id]` multimap value for the per-user indexes.
#[inline]
pub fn encode_ts_id(ts: Timestamp, id: &str) -> Vec<u8> {
    let id_bytes = id.as_bytes();
    let mut value = Vec::with_capacity(8 + id_bytes.len());
    value.extend_from_slice(&ts.to_be_bytes());
    value.extend_from_slice(id_bytes);
    value
}

/// Decodes a `[server_ts BE 8][id]` multimap value.
///
/// Returns `None` when the value is too short or the id is not UTF-8,
/// which would indicate corruption.
#[inline]
pub fn decode_ts_id(value: &[u8]) -> Option<(Timestamp, String)> {
    if value.len() < 8 {
        return None;
    }
    let mut ts_bytes = [0u8; 8];
    ts_bytes.copy_from_slice(&value[..8]);
    let id = std::str::from_utf8(&value[8..]).ok()?.to_owned();
    Some((Timestamp::from_millis(i64::from_be_bytes(ts_bytes)), id))
}

/// Encodes a `(user_id, suffix)` composite key with a length prefix.
#[inline]
pub fn scoped_key(user_id: &str, suffix: &str) -> Vec<u8> {
    let user_bytes = user_id.as_bytes();
    let mut key = Vec::with_capacity(4 + user_bytes.len() + suffix.len());
    key.extend_from_slice(&(user_bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(user_bytes);
    key.extend_from_slice(suffix.as_bytes());
    key
}

/// Encodes a `[keyword_id BE 8][score f32 bits BE 4]` note-keyword link value.
#[inline]
pub fn encode_keyword_link(keyword_id: u64, score: f32) -> [u8; 12] {
    let mut value = [0u8; 12];
    value[..8].copy_from_slice(&keyword_id.to_be_bytes());
    value[8..].copy_from_slice(&score.to_bits().to_be_bytes());
    value
}

/// Decodes a note-keyword link value. Returns `None` on corrupt length.
#[inline]
pub fn decode_keyword_link(value: &[u8]) -> Option<(u64, f32)> {
    if value.len() != 12 {
        return None;
    }
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&value[..8]);
    let mut score_bytes = [0u8; 4];
    score_bytes.copy_from_slice(&value[8..]);
    Some((
        u64::from_be_bytes(id_bytes),
        f32::from_bits(u32::from_be_bytes(score_bytes)),
    ))
}
