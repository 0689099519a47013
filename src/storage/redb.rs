//! redb storage engine implementation.
//!
//! This module provides the primary storage backend for Engram using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//!
//! The single-writer property is what makes per-row last-writer-wins
//! comparisons linearizable: a compare in one push item and the write it
//! decides commit inside one exclusive transaction.

use std::path::{Path, PathBuf};

use ::redb::{Database, ReadableMultimapTable, ReadableTable};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    decode_keyword_link, decode_ts_id, encode_keyword_link, encode_ts_id, scoped_key,
    DatabaseMetadata, KEYWORDS_BY_NAME_TABLE, KEYWORD_NAMES_TABLE, METADATA_TABLE,
    NOTES_BY_USER_TABLE, NOTES_TABLE, NOTE_EMBEDDINGS_TABLE, NOTE_KEYWORDS_TABLE,
    REFLECTIONS_BY_USER_TABLE, REFLECTIONS_TABLE, RELATIONS_BY_USER_TABLE, RELATIONS_TABLE,
    REPORTS_TABLE, SCHEMA_VERSION, USERS_BY_EMAIL_TABLE, USERS_TABLE,
};
use super::StorageEngine;
use crate::config::Config;
use crate::error::{EngramError, Result, StorageError, ValidationError};
use crate::note::Note;
use crate::reflection::Reflection;
use crate::relation::Relation;
use crate::types::{Embedding, NoteId, RelationId, Timestamp, UserId};
use crate::user::User;

/// Metadata key in the metadata table.
const METADATA_KEY: &str = "db_metadata";

/// Keyword id counter key in the metadata table.
const NEXT_KEYWORD_ID_KEY: &str = "next_keyword_id";

/// redb storage engine wrapper.
///
/// This struct holds the redb database handle and cached metadata.
/// It implements [`StorageEngine`] for use with Engram.
///
/// # Thread Safety
///
/// `RedbStorage` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStorage {
    /// The redb database handle.
    db: Database,

    /// Cached database metadata.
    metadata: DatabaseMetadata,

    /// Path to the database file.
    path: PathBuf,
}

impl RedbStorage {
    /// Opens or creates a database at the given path.
    ///
    /// If the database doesn't exist, it will be created and initialized
    /// with the configuration settings. If it exists, the configuration
    /// will be validated against the stored metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is corrupted
    /// - The database is locked by another process
    /// - Schema version doesn't match
    /// - Embedding dimension doesn't match (for existing databases)
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let db_exists = path.exists();

        debug!(db_exists = db_exists, "Opening storage engine");

        let db = Self::create_database(path)?;

        if db_exists {
            Self::open_existing(db, path.to_path_buf(), config)
        } else {
            Self::initialize_new(db, path.to_path_buf(), config)
        }
    }

    /// Creates the redb database handle.
    fn create_database(path: &Path) -> Result<Database> {
        let db = Database::builder().create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Database file opened successfully");
        Ok(db)
    }

    /// Initializes a new database with tables and metadata.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Initializing new database");

        let metadata = DatabaseMetadata::new(config.embedding_dimension);

        // Create all tables and write metadata in a single transaction
        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes =
                bincode::serialize(&metadata).map_err(StorageError::from)?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;
            meta_table.insert(NEXT_KEYWORD_ID_KEY, 1u64.to_le_bytes().as_slice())?;

            // Create remaining tables so later read transactions never
            // observe a missing table
            let _ = write_txn.open_table(USERS_TABLE)?;
            let _ = write_txn.open_table(USERS_BY_EMAIL_TABLE)?;
            let _ = write_txn.open_table(NOTES_TABLE)?;
            let _ = write_txn.open_table(NOTE_EMBEDDINGS_TABLE)?;
            let _ = write_txn.open_multimap_table(NOTES_BY_USER_TABLE)?;
            let _ = write_txn.open_table(RELATIONS_TABLE)?;
            let _ = write_txn.open_multimap_table(RELATIONS_BY_USER_TABLE)?;
            let _ = write_txn.open_table(REFLECTIONS_TABLE)?;
            let _ = write_txn.open_multimap_table(REFLECTIONS_BY_USER_TABLE)?;
            let _ = write_txn.open_table(KEYWORDS_BY_NAME_TABLE)?;
            let _ = write_txn.open_table(KEYWORD_NAMES_TABLE)?;
            let _ = write_txn.open_multimap_table(NOTE_KEYWORDS_TABLE)?;
            let _ = write_txn.open_table(REPORTS_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = SCHEMA_VERSION,
            dimension = config.embedding_dimension,
            "Database initialized"
        );

        Ok(Self { db, metadata, path })
    }

    /// Opens and validates an existing database.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Opening existing database");

        let read_txn = db.begin_read().map_err(StorageError::from)?;

        let metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                StorageError::corrupted(format!("Cannot open metadata table: {}", e))
            })?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing database metadata"))?;

            bincode::deserialize::<DatabaseMetadata>(metadata_bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };

        drop(read_txn);

        if metadata.schema_version != SCHEMA_VERSION {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(EngramError::Storage(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        if metadata.embedding_dimension != config.embedding_dimension {
            warn!(
                expected = config.embedding_dimension,
                found = metadata.embedding_dimension,
                "Embedding dimension mismatch"
            );
            return Err(EngramError::Validation(ValidationError::DimensionMismatch {
                expected: config.embedding_dimension,
                got: metadata.embedding_dimension,
            }));
        }

        // Update last_opened_at timestamp
        let mut metadata = metadata;
        metadata.touch();

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes =
                bincode::serialize(&metadata).map_err(StorageError::from)?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = metadata.schema_version,
            dimension = metadata.embedding_dimension,
            "Database opened successfully"
        );

        Ok(Self { db, metadata, path })
    }
}

// ============================================================================
// Embedding byte encoding
// ============================================================================

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Embedding {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl StorageEngine for RedbStorage {
    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    #[instrument(skip(self))]
    fn close(self: Box<Self>) -> Result<()> {
        info!("Closing storage engine");

        // redb flushes durably on drop; dropping explicitly keeps the
        // close-consumes-handle contract visible
        drop(self.db);

        info!("Storage engine closed");
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    // =========================================================================
    // Users
    // =========================================================================

    fn save_user(&self, user: &User) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut users = write_txn.open_table(USERS_TABLE)?;
            let mut by_email = write_txn.open_table(USERS_BY_EMAIL_TABLE)?;

            // Email uniqueness is case-exact
            let holder = by_email
                .get(user.email.as_str())?
                .map(|guard| guard.value().to_owned());
            if let Some(holder) = holder {
                if holder != user.id.as_str() {
                    return Err(EngramError::conflict(format!(
                        "email already registered: {}",
                        user.email
                    )));
                }
            }

            // Drop a stale email index entry if this user changed address
            let previous_email = users
                .get(user.id.as_str())?
                .map(|guard| bincode::deserialize::<User>(guard.value()))
                .transpose()
                .map_err(StorageError::from)?
                .map(|stored| stored.email);
            if let Some(previous_email) = previous_email {
                if previous_email != user.email {
                    by_email.remove(previous_email.as_str())?;
                }
            }

            let user_bytes = bincode::serialize(user).map_err(StorageError::from)?;
            users.insert(user.id.as_str(), user_bytes.as_slice())?;
            by_email.insert(user.email.as_str(), user.id.as_str())?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let users = read_txn.open_table(USERS_TABLE)?;
        users
            .get(id.as_str())?
            .map(|guard| bincode::deserialize(guard.value()).map_err(EngramError::from))
            .transpose()
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let by_email = read_txn.open_table(USERS_BY_EMAIL_TABLE)?;
        let user_id = match by_email.get(email)? {
            Some(guard) => guard.value().to_owned(),
            None => return Ok(None),
        };
        let users = read_txn.open_table(USERS_TABLE)?;
        users
            .get(user_id.as_str())?
            .map(|guard| bincode::deserialize(guard.value()).map_err(EngramError::from))
            .transpose()
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let users = read_txn.open_table(USERS_TABLE)?;
        let mut result = Vec::new();
        for entry in users.iter()? {
            let (_, value) = entry.map_err(StorageError::from)?;
            result.push(bincode::deserialize(value.value()).map_err(StorageError::from)?);
        }
        Ok(result)
    }

    // =========================================================================
    // Notes
    // =========================================================================

    fn get_note(&self, id: &NoteId) -> Result<Option<Note>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let notes = read_txn.open_table(NOTES_TABLE)?;
        let mut note: Note = match notes.get(id.as_str())? {
            Some(guard) => bincode::deserialize(guard.value()).map_err(StorageError::from)?,
            None => return Ok(None),
        };

        let embeddings = read_txn.open_table(NOTE_EMBEDDINGS_TABLE)?;
        note.embedding = embeddings
            .get(id.as_str())?
            .map(|guard| decode_embedding(guard.value()));

        Ok(Some(note))
    }

    fn save_note(
        &self,
        note: &Note,
        prev_server_timestamp: Option<Timestamp>,
        keywords: &[(String, f32)],
    ) -> Result<()> {
        // The embedding lives in its own table; strip it from the record
        let mut record = note.clone();
        let embedding = record.embedding.take();
        let record_bytes = bincode::serialize(&record).map_err(StorageError::from)?;

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut notes = write_txn.open_table(NOTES_TABLE)?;
            notes.insert(note.id.as_str(), record_bytes.as_slice())?;

            let mut embeddings = write_txn.open_table(NOTE_EMBEDDINGS_TABLE)?;
            match &embedding {
                Some(embedding) => {
                    let bytes = encode_embedding(embedding);
                    embeddings.insert(note.id.as_str(), bytes.as_slice())?;
                }
                None => {
                    embeddings.remove(note.id.as_str())?;
                }
            }

            let mut by_user = write_txn.open_multimap_table(NOTES_BY_USER_TABLE)?;
            if let Some(prev) = prev_server_timestamp {
                let old_entry = encode_ts_id(prev, note.id.as_str());
                by_user.remove(note.user_id.as_str(), old_entry.as_slice())?;
            }
            let new_entry = encode_ts_id(note.server_timestamp, note.id.as_str());
            by_user.insert(note.user_id.as_str(), new_entry.as_slice())?;

            // Replace the note's entire keyword link set
            let mut links = write_txn.open_multimap_table(NOTE_KEYWORDS_TABLE)?;
            links.remove_all(note.id.as_str())?;

            let mut by_name = write_txn.open_table(KEYWORDS_BY_NAME_TABLE)?;
            let mut names = write_txn.open_table(KEYWORD_NAMES_TABLE)?;
            let mut meta = write_txn.open_table(METADATA_TABLE)?;

            let mut next_id = meta
                .get(NEXT_KEYWORD_ID_KEY)?
                .map(|guard| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&guard.value()[..8]);
                    u64::from_le_bytes(bytes)
                })
                .unwrap_or(1);

            for (name, score) in keywords {
                // Copy the id out before any mutation so the read guard
                // releases its borrow of the table
                let existing = by_name.get(name.as_str())?.map(|guard| guard.value());
                let keyword_id = match existing {
                    Some(id) => id,
                    None => {
                        let id = next_id;
                        next_id += 1;
                        by_name.insert(name.as_str(), id)?;
                        names.insert(id, name.as_str())?;
                        id
                    }
                };
                let link = encode_keyword_link(keyword_id, *score);
                links.insert(note.id.as_str(), link.as_slice())?;
            }

            meta.insert(NEXT_KEYWORD_ID_KEY, next_id.to_le_bytes().as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn note_keywords(&self, id: &NoteId) -> Result<Vec<(String, f32)>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let links = read_txn.open_multimap_table(NOTE_KEYWORDS_TABLE)?;
        let names = read_txn.open_table(KEYWORD_NAMES_TABLE)?;

        let mut result = Vec::new();
        for entry in links.get(id.as_str())? {
            let guard = entry.map_err(StorageError::from)?;
            let (keyword_id, score) = decode_keyword_link(guard.value()).ok_or_else(|| {
                StorageError::corrupted("note_keywords link has invalid length")
            })?;
            if let Some(name) = names.get(keyword_id)? {
                result.push((name.value().to_owned(), score));
            }
        }
        Ok(result)
    }

    fn notes_since(
        &self,
        user_id: &UserId,
        after: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Note>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let by_user = read_txn.open_multimap_table(NOTES_BY_USER_TABLE)?;
        let notes = read_txn.open_table(NOTES_TABLE)?;

        let mut result = Vec::new();
        for entry in by_user.get(user_id.as_str())? {
            if result.len() >= limit {
                break;
            }
            let guard = entry.map_err(StorageError::from)?;
            let (ts, note_id) = decode_ts_id(guard.value())
                .ok_or_else(|| StorageError::corrupted("notes_by_user entry is invalid"))?;
            if let Some(after) = after {
                if ts <= after {
                    continue;
                }
            }
            if let Some(row) = notes.get(note_id.as_str())? {
                let note: Note =
                    bincode::deserialize(row.value()).map_err(StorageError::from)?;
                result.push(note);
            }
        }
        Ok(result)
    }

    fn list_notes(&self, user_id: &UserId) -> Result<Vec<Note>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let by_user = read_txn.open_multimap_table(NOTES_BY_USER_TABLE)?;
        let notes = read_txn.open_table(NOTES_TABLE)?;
        let embeddings = read_txn.open_table(NOTE_EMBEDDINGS_TABLE)?;

        let mut result = Vec::new();
        for entry in by_user.get(user_id.as_str())? {
            let guard = entry.map_err(StorageError::from)?;
            let (_, note_id) = decode_ts_id(guard.value())
                .ok_or_else(|| StorageError::corrupted("notes_by_user entry is invalid"))?;
            if let Some(row) = notes.get(note_id.as_str())? {
                let mut note: Note =
                    bincode::deserialize(row.value()).map_err(StorageError::from)?;
                note.embedding = embeddings
                    .get(note_id.as_str())?
                    .map(|guard| decode_embedding(guard.value()));
                result.push(note);
            }
        }
        Ok(result)
    }

    // =========================================================================
    // Relations
    // =========================================================================

    fn get_relation(&self, id: &RelationId) -> Result<Option<Relation>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let relations = read_txn.open_table(RELATIONS_TABLE)?;
        relations
            .get(id.as_str())?
            .map(|guard| bincode::deserialize(guard.value()).map_err(EngramError::from))
            .transpose()
    }

    fn save_relation(&self, relation: &Relation) -> Result<()> {
        let relation_bytes = bincode::serialize(relation).map_err(StorageError::from)?;

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut relations = write_txn.open_table(RELATIONS_TABLE)?;
            relations.insert(relation.id.as_str(), relation_bytes.as_slice())?;

            let mut by_user = write_txn.open_multimap_table(RELATIONS_BY_USER_TABLE)?;
            let entry = encode_ts_id(relation.server_timestamp, relation.id.as_str());
            by_user.insert(relation.user_id.as_str(), entry.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn delete_relation(&self, id: &RelationId) -> Result<bool> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let existed;
        {
            let mut relations = write_txn.open_table(RELATIONS_TABLE)?;
            let stored: Option<Relation> = relations
                .remove(id.as_str())?
                .map(|guard| bincode::deserialize(guard.value()))
                .transpose()
                .map_err(StorageError::from)?;

            existed = stored.is_some();
            if let Some(stored) = stored {
                let mut by_user = write_txn.open_multimap_table(RELATIONS_BY_USER_TABLE)?;
                let entry = encode_ts_id(stored.server_timestamp, stored.id.as_str());
                by_user.remove(stored.user_id.as_str(), entry.as_slice())?;
            }
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(existed)
    }

    fn relations_since(
        &self,
        user_id: &UserId,
        after: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Relation>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let by_user = read_txn.open_multimap_table(RELATIONS_BY_USER_TABLE)?;
        let relations = read_txn.open_table(RELATIONS_TABLE)?;

        let mut result = Vec::new();
        for entry in by_user.get(user_id.as_str())? {
            if result.len() >= limit {
                break;
            }
            let guard = entry.map_err(StorageError::from)?;
            let (ts, relation_id) = decode_ts_id(guard.value())
                .ok_or_else(|| StorageError::corrupted("relations_by_user entry is invalid"))?;
            if let Some(after) = after {
                if ts <= after {
                    continue;
                }
            }
            if let Some(row) = relations.get(relation_id.as_str())? {
                result.push(bincode::deserialize(row.value()).map_err(StorageError::from)?);
            }
        }
        Ok(result)
    }

    // =========================================================================
    // Reflections
    // =========================================================================

    fn get_reflection(&self, user_id: &UserId, date: &str) -> Result<Option<Reflection>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let reflections = read_txn.open_table(REFLECTIONS_TABLE)?;
        let key = scoped_key(user_id.as_str(), date);
        reflections
            .get(key.as_slice())?
            .map(|guard| bincode::deserialize(guard.value()).map_err(EngramError::from))
            .transpose()
    }

    fn save_reflection(
        &self,
        reflection: &Reflection,
        prev_server_timestamp: Option<Timestamp>,
    ) -> Result<()> {
        let reflection_bytes = bincode::serialize(reflection).map_err(StorageError::from)?;
        let key = scoped_key(reflection.user_id.as_str(), &reflection.date);

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut reflections = write_txn.open_table(REFLECTIONS_TABLE)?;
            reflections.insert(key.as_slice(), reflection_bytes.as_slice())?;

            let mut by_user = write_txn.open_multimap_table(REFLECTIONS_BY_USER_TABLE)?;
            if let Some(prev) = prev_server_timestamp {
                let old_entry = encode_ts_id(prev, &reflection.date);
                by_user.remove(reflection.user_id.as_str(), old_entry.as_slice())?;
            }
            let entry = encode_ts_id(reflection.server_timestamp, &reflection.date);
            by_user.insert(reflection.user_id.as_str(), entry.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn delete_reflection(&self, user_id: &UserId, date: &str) -> Result<bool> {
        let key = scoped_key(user_id.as_str(), date);

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let existed;
        {
            let mut reflections = write_txn.open_table(REFLECTIONS_TABLE)?;
            let stored: Option<Reflection> = reflections
                .remove(key.as_slice())?
                .map(|guard| bincode::deserialize(guard.value()))
                .transpose()
                .map_err(StorageError::from)?;

            existed = stored.is_some();
            if let Some(stored) = stored {
                let mut by_user = write_txn.open_multimap_table(REFLECTIONS_BY_USER_TABLE)?;
                let entry = encode_ts_id(stored.server_timestamp, &stored.date);
                by_user.remove(user_id.as_str(), entry.as_slice())?;
            }
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(existed)
    }

    fn reflections_since(
        &self,
        user_id: &UserId,
        after: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<Reflection>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let by_user = read_txn.open_multimap_table(REFLECTIONS_BY_USER_TABLE)?;
        let reflections = read_txn.open_table(REFLECTIONS_TABLE)?;

        let mut result = Vec::new();
        for entry in by_user.get(user_id.as_str())? {
            if result.len() >= limit {
                break;
            }
            let guard = entry.map_err(StorageError::from)?;
            let (ts, date) = decode_ts_id(guard.value()).ok_or_else(|| {
                StorageError::corrupted("reflections_by_user entry is invalid")
            })?;
            if let Some(after) = after {
                if ts <= after {
                    continue;
                }
            }
            let key = scoped_key(user_id.as_str(), &date);
            if let Some(row) = reflections.get(key.as_slice())? {
                result.push(bincode::deserialize(row.value()).map_err(StorageError::from)?);
            }
        }
        Ok(result)
    }

    // =========================================================================
    // Weekly reports
    // =========================================================================

    fn get_report(&self, user_id: &UserId, week_key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let reports = read_txn.open_table(REPORTS_TABLE)?;
        let key = scoped_key(user_id.as_str(), week_key);
        Ok(reports.get(key.as_slice())?.map(|guard| guard.value().to_vec()))
    }

    fn save_report(&self, user_id: &UserId, week_key: &str, blob: &[u8]) -> Result<()> {
        let key = scoped_key(user_id.as_str(), week_key);

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut reports = write_txn.open_table(REPORTS_TABLE)?;
            reports.insert(key.as_slice(), blob)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }
}
