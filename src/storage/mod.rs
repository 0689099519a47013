//! Storage layer abstractions for Engram.
//!
//! This module provides a trait-based abstraction over the storage engine,
//! allowing different backends to be used (e.g., redb, mock for testing).
//!
//! # Write granularity
//!
//! Every mutating method commits its own transaction. That granularity is
//! load-bearing for the sync protocol: each push item must commit or roll
//! back independently, so one storage call maps to one item's entire write
//! (a note save rewrites the row, the embedding, the delta index entry, and
//! the whole keyword link set together).

pub mod redb;
pub mod schema;

pub use self::redb::RedbStorage;
pub use schema::{DatabaseMetadata, SCHEMA_VERSION};

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::note::Note;
use crate::reflection::Reflection;
use crate::relation::Relation;
use crate::types::{NoteId, RelationId, Timestamp, UserId};
use crate::user::User;

/// Storage engine trait for Engram.
///
/// This trait defines the contract that any storage backend must implement.
/// The primary implementation is [`RedbStorage`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow the database to be shared
/// across threads. The engine handles internal synchronization; in
/// particular, writes against the same row must serialize so that
/// last-writer-wins comparisons stay linearizable per row.
pub trait StorageEngine: Send + Sync {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns the database metadata.
    fn metadata(&self) -> &DatabaseMetadata;

    /// Closes the storage engine, flushing any pending writes.
    ///
    /// This method consumes the storage engine. After calling `close()`,
    /// the engine cannot be used.
    fn close(self: Box<Self>) -> Result<()>;

    /// Returns the path to the database file, if applicable.
    fn path(&self) -> Option<&Path>;

    // =========================================================================
    // Users
    // =========================================================================

    /// Saves a user, enforcing email uniqueness.
    ///
    /// # Errors
    ///
    /// Returns a conflict error if another user already holds the email.
    fn save_user(&self, user: &User) -> Result<()>;

    /// Retrieves a user by id. Returns `None` if absent.
    fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Retrieves a user by email (case-exact). Returns `None` if absent.
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Lists all users. Used to rebuild per-user vector indexes on open.
    fn list_users(&self) -> Result<Vec<User>>;

    // =========================================================================
    // Notes
    // =========================================================================

    /// Retrieves a note by id with its embedding attached.
    fn get_note(&self, id: &NoteId) -> Result<Option<Note>>;

    /// Saves a note together with its derived keyword set.
    ///
    /// One transaction writes:
    /// - the note row (embedding stripped)
    /// - the embedding row (removed when the note has none)
    /// - the per-user delta index entry (the entry under
    ///   `prev_server_timestamp` is replaced, so pass the stored row's
    ///   previous value on updates)
    /// - the note's entire keyword link set, replacing whatever was there
    ///   (keyword rows are found-or-inserted by name)
    fn save_note(
        &self,
        note: &Note,
        prev_server_timestamp: Option<Timestamp>,
        keywords: &[(String, f32)],
    ) -> Result<()>;

    /// Returns the `(name, score)` keyword links attached to a note.
    fn note_keywords(&self, id: &NoteId) -> Result<Vec<(String, f32)>>;

    /// Scans a user's notes with `server_timestamp > after`, ordered by
    /// server timestamp ascending, up to `limit` rows.
    ///
    /// Embeddings are not attached; the pull path never serializes them.
    fn notes_since(
        &self,
        user_id: &UserId,
        after: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Note>>;

    /// Lists all of a user's notes with embeddings attached, ordered by
    /// server timestamp ascending.
    fn list_notes(&self, user_id: &UserId) -> Result<Vec<Note>>;

    // =========================================================================
    // Relations
    // =========================================================================

    /// Retrieves a relation by id. Returns `None` if absent.
    fn get_relation(&self, id: &RelationId) -> Result<Option<Relation>>;

    /// Saves a relation and its delta index entry atomically.
    fn save_relation(&self, relation: &Relation) -> Result<()>;

    /// Hard-deletes a relation and its index entry.
    ///
    /// Returns `true` if the relation existed and was deleted.
    fn delete_relation(&self, id: &RelationId) -> Result<bool>;

    /// Scans a user's relations with `server_timestamp > after`, ordered by
    /// server timestamp ascending, up to `limit` rows.
    fn relations_since(
        &self,
        user_id: &UserId,
        after: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Relation>>;

    // =========================================================================
    // Reflections
    // =========================================================================

    /// Retrieves a reflection by `(user, date)`. Returns `None` if absent.
    fn get_reflection(&self, user_id: &UserId, date: &str) -> Result<Option<Reflection>>;

    /// Saves a reflection and swaps its delta index entry atomically.
    fn save_reflection(
        &self,
        reflection: &Reflection,
        prev_server_timestamp: Option<Timestamp>,
    ) -> Result<()>;

    /// Hard-deletes a reflection and its index entry.
    ///
    /// Returns `true` if the reflection existed and was deleted.
    fn delete_reflection(&self, user_id: &UserId, date: &str) -> Result<bool>;

    /// Scans a user's reflections with `server_timestamp > after`, ordered
    /// by server timestamp ascending, up to `limit` rows.
    fn reflections_since(
        &self,
        user_id: &UserId,
        after: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Reflection>>;

    // =========================================================================
    // Weekly reports
    // =========================================================================

    /// Returns the cached report blob for `(user, week_key)`, byte-exact.
    fn get_report(&self, user_id: &UserId, week_key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores (or replaces) the report blob for `(user, week_key)`.
    fn save_report(&self, user_id: &UserId, week_key: &str, blob: &[u8]) -> Result<()>;
}

/// Opens a storage engine at the given path.
///
/// This is a convenience function that creates a [`RedbStorage`] instance.
/// For more control, use `RedbStorage::open()` directly.
///
/// # Errors
///
/// Returns an error if:
/// - The database file is corrupted
/// - The database is locked by another process
/// - Schema version doesn't match
/// - Embedding dimension doesn't match (for existing databases)
pub fn open_storage(path: impl AsRef<Path>, config: &Config) -> Result<Box<dyn StorageEngine>> {
    let storage = RedbStorage::open(path, config)?;
    Ok(Box::new(storage))
}
