//! Engram main struct and lifecycle operations.
//!
//! The [`Engram`] struct is the primary interface for the sync core. It
//! owns the storage engine, the embedding and keyword services, and the
//! per-user vector indexes, and exposes the four platform operations:
//!
//! - [`push`](Engram::push) / [`pull`](Engram::pull) — device synchronization
//! - [`recommend`](Engram::recommend) — related-note retrieval
//! - [`weekly_report`](Engram::weekly_report) — weekly insight generation
//!
//! plus user registration bookkeeping for the auth boundary above it.
//!
//! # Thread Safety
//!
//! `Engram` is `Send + Sync` and is meant to be shared across request
//! handlers via `Arc`. The storage engine serializes row writes, the
//! services are immutable, and the vector index map carries its own lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::embedding::{create_embedding_service, EmbeddingService};
use crate::error::{EngramError, NotFoundError, Result};
use crate::keyword::{create_keyword_service, KeywordService};
use crate::note::Note;
use crate::recommend::RecommendationResult;
use crate::reflection::Reflection;
use crate::relation::Relation;
use crate::report::WeeklyReportResponse;
use crate::storage::{open_storage, DatabaseMetadata, StorageEngine};
use crate::sync::types::{PullRequest, PullResponse, PushRequest, PushResponse};
use crate::types::{Embedding, NoteId, RelationId, UserId};
use crate::user::{validate_registration, User};
use crate::vector::NoteIndex;

/// The main Engram handle.
///
/// Create an instance with [`Engram::open()`] and close it with
/// [`Engram::close()`]. The handle owns its storage and services; closing
/// consumes it so resources release deterministically.
pub struct Engram {
    /// Storage engine (redb in production).
    storage: Box<dyn StorageEngine>,

    /// Embedding service (process-wide singleton).
    embedding: Box<dyn EmbeddingService>,

    /// Keyword extraction service (process-wide singleton).
    keywords: Box<dyn KeywordService>,

    /// Configuration used to open this database.
    config: Config,

    /// Per-user HNSW indexes over note embeddings.
    ///
    /// The outer RwLock protects the map (indexes appear when a user's
    /// first embedded note lands); each index synchronizes internally.
    vectors: RwLock<HashMap<UserId, NoteIndex>>,
}

impl std::fmt::Debug for Engram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index_count = self.vectors.read().map(|v| v.len()).unwrap_or(0);
        f.debug_struct("Engram")
            .field("embedding_dimension", &self.embedding_dimension())
            .field("vector_indexes", &index_count)
            .finish_non_exhaustive()
    }
}

impl Engram {
    /// Opens or creates an Engram database at the specified path.
    ///
    /// If the database doesn't exist, it will be created with the given
    /// configuration. If it exists, the configuration is validated against
    /// the stored settings (the embedding dimension is locked at creation).
    /// Vector indexes are rebuilt from stored embeddings; the store is the
    /// source of truth.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the database file
    /// is corrupted or locked, or the schema/dimension doesn't match.
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate().map_err(EngramError::from)?;

        info!("Opening Engram");

        let storage = open_storage(&path, &config)?;
        let embedding = create_embedding_service(&config)?;
        let keywords = create_keyword_service(&config)?;
        let vectors = Self::load_all_indexes(&*storage, &config)?;

        info!(
            dimension = config.embedding_dimension,
            users = vectors.len(),
            "Engram opened successfully"
        );

        Ok(Self {
            storage,
            embedding,
            keywords,
            config,
            vectors: RwLock::new(vectors),
        })
    }

    /// Closes the database, flushing all pending writes.
    ///
    /// Consumes the handle; vector indexes are in-memory projections and
    /// need no persistence of their own.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!("Closing Engram");
        self.storage.close()?;
        info!("Engram closed successfully");
        Ok(())
    }

    /// Returns a reference to the database configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the database metadata.
    #[inline]
    pub fn metadata(&self) -> &DatabaseMetadata {
        self.storage.metadata()
    }

    /// Returns the embedding dimension configured for this database.
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.config.embedding_dimension
    }

    // =========================================================================
    // Internal accessors (for the engine modules)
    // =========================================================================

    #[inline]
    pub(crate) fn storage(&self) -> &dyn StorageEngine {
        self.storage.as_ref()
    }

    #[inline]
    pub(crate) fn embedder(&self) -> &dyn EmbeddingService {
        self.embedding.as_ref()
    }

    #[inline]
    pub(crate) fn keywords(&self) -> &dyn KeywordService {
        self.keywords.as_ref()
    }

    // =========================================================================
    // Vector index lifecycle
    // =========================================================================

    /// Rebuilds every user's index from stored embeddings.
    fn load_all_indexes(
        storage: &dyn StorageEngine,
        config: &Config,
    ) -> Result<HashMap<UserId, NoteIndex>> {
        let users = storage.list_users()?;
        let mut vectors = HashMap::with_capacity(users.len());

        for user in &users {
            let notes = storage.list_notes(&user.id)?;
            let index = NoteIndex::new(config.embedding_dimension, &config.hnsw);
            let mut inserted = 0usize;
            for note in &notes {
                if note.is_deleted() {
                    continue;
                }
                if let Some(embedding) = &note.embedding {
                    index.upsert(&note.id, embedding)?;
                    inserted += 1;
                }
            }
            if inserted > 0 {
                info!(user = %user.id, vectors = inserted, "Rebuilt note index");
            }
            vectors.insert(user.id.clone(), index);
        }

        Ok(vectors)
    }

    /// Inserts or replaces a note vector, creating the user's index lazily.
    pub(crate) fn vector_upsert(
        &self,
        user_id: &UserId,
        note_id: &NoteId,
        embedding: &Embedding,
    ) -> Result<()> {
        {
            let vectors = self
                .vectors
                .read()
                .map_err(|_| EngramError::vector("Index map lock poisoned"))?;
            if let Some(index) = vectors.get(user_id) {
                return index.upsert(note_id, embedding);
            }
        }

        let mut vectors = self
            .vectors
            .write()
            .map_err(|_| EngramError::vector("Index map lock poisoned"))?;
        let index = vectors
            .entry(user_id.clone())
            .or_insert_with(|| NoteIndex::new(self.config.embedding_dimension, &self.config.hnsw));
        index.upsert(note_id, embedding)
    }

    /// Retires a note vector. A user without an index is a no-op.
    pub(crate) fn vector_remove(&self, user_id: &UserId, note_id: &NoteId) -> Result<()> {
        let vectors = self
            .vectors
            .read()
            .map_err(|_| EngramError::vector("Index map lock poisoned"))?;
        match vectors.get(user_id) {
            Some(index) => index.remove(note_id),
            None => Ok(()),
        }
    }

    /// Searches a user's index; a user without an index has no neighbors.
    pub(crate) fn vector_search(
        &self,
        user_id: &UserId,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(NoteId, f32)>> {
        let vectors = self
            .vectors
            .read()
            .map_err(|_| EngramError::vector("Index map lock poisoned"))?;
        match vectors.get(user_id) {
            Some(index) => index.search(query, k, self.config.hnsw.ef_search),
            None => Ok(Vec::new()),
        }
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Registers a new user.
    ///
    /// The password hash is produced by the auth boundary; the core stores
    /// it opaquely.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an implausible email or empty hash,
    /// and a conflict error when the email is already registered.
    #[instrument(skip(self, password_hash))]
    pub fn register_user(&self, email: &str, password_hash: &str) -> Result<User> {
        validate_registration(email, password_hash)?;

        let user = User::new(email, password_hash);
        self.storage.save_user(&user)?;

        info!(user = %user.id, "User registered");
        Ok(user)
    }

    /// Returns a user by id, or `None` if not found.
    pub fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        self.storage.get_user(id)
    }

    /// Returns a user by email (case-exact), or `None` if not found.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.storage.get_user_by_email(email)
    }

    /// Administrative deactivation; the account stops authenticating but
    /// its data stays intact.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::User`] if the user doesn't exist.
    #[instrument(skip(self))]
    pub fn deactivate_user(&self, id: &UserId) -> Result<()> {
        let mut user = self
            .storage
            .get_user(id)?
            .ok_or_else(|| NotFoundError::user(id))?;

        if !user.is_active {
            return Ok(());
        }

        user.is_active = false;
        self.storage.save_user(&user)?;

        info!(user = %id, "User deactivated");
        Ok(())
    }

    /// Verifies the authenticated user exists before a sync operation.
    fn require_user(&self, user_id: &UserId) -> Result<()> {
        if self.storage.get_user(user_id)?.is_none() {
            warn!(user = %user_id, "Sync request for unknown user");
            return Err(NotFoundError::user(user_id).into());
        }
        Ok(())
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Applies a push batch for the authenticated user.
    ///
    /// Envelope-level violations (empty batch, item or byte cap exceeded,
    /// unknown user) fail the whole request before any item is applied;
    /// everything else is reported per item in the response.
    #[instrument(skip(self, request), fields(user = %user_id, changes = request.changes.len()))]
    pub fn push(&self, user_id: &UserId, request: PushRequest) -> Result<PushResponse> {
        self.require_user(user_id)?;
        crate::sync::push(self, user_id, request)
    }

    /// Serves a checkpoint-bounded delta pull for the authenticated user.
    #[instrument(skip(self, request), fields(user = %user_id))]
    pub fn pull(&self, user_id: &UserId, request: PullRequest) -> Result<PullResponse> {
        self.require_user(user_id)?;
        crate::sync::pull(self, user_id, request)
    }

    // =========================================================================
    // Recommendations & reports
    // =========================================================================

    /// Returns the top-`k` notes related to `note_id`.
    ///
    /// # Errors
    ///
    /// - Validation error when `k` is outside `1..=50`
    /// - [`NotFoundError::Note`] when the note is missing, soft-deleted, or
    ///   owned by another user
    #[instrument(skip(self), fields(user = %user_id, note = %note_id))]
    pub fn recommend(
        &self,
        user_id: &UserId,
        note_id: &NoteId,
        k: usize,
    ) -> Result<RecommendationResult> {
        crate::recommend::recommend(self, user_id, note_id, k)
    }

    /// Returns (generating if needed) the weekly report for `week_key`.
    ///
    /// # Errors
    ///
    /// - Validation error for a malformed or out-of-range week key
    /// - [`NotFoundError::WeekEmpty`] when the week has no analyzable notes
    #[instrument(skip(self), fields(user = %user_id, week = %week_key))]
    pub fn weekly_report(
        &self,
        user_id: &UserId,
        week_key: &str,
        regenerate: bool,
    ) -> Result<WeeklyReportResponse> {
        crate::report::weekly_report(self, user_id, week_key, regenerate)
    }

    // =========================================================================
    // Ownership-checked accessors
    // =========================================================================

    /// Returns one of the user's notes, or `None` when absent or foreign.
    ///
    /// Soft-deleted notes are returned (with `deleted_at` set) so hosts can
    /// inspect tombstones.
    pub fn get_note(&self, user_id: &UserId, note_id: &NoteId) -> Result<Option<Note>> {
        Ok(self
            .storage
            .get_note(note_id)?
            .filter(|note| note.user_id == *user_id))
    }

    /// Returns the keyword names linked to one of the user's notes,
    /// ordered by link score descending.
    pub fn get_note_keywords(&self, user_id: &UserId, note_id: &NoteId) -> Result<Vec<String>> {
        if self.get_note(user_id, note_id)?.is_none() {
            return Ok(Vec::new());
        }
        let mut links = self.storage.note_keywords(note_id)?;
        links.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(links.into_iter().map(|(name, _)| name).collect())
    }

    /// Returns one of the user's relations, or `None` when absent or foreign.
    pub fn get_relation(
        &self,
        user_id: &UserId,
        relation_id: &RelationId,
    ) -> Result<Option<Relation>> {
        Ok(self
            .storage
            .get_relation(relation_id)?
            .filter(|relation| relation.user_id == *user_id))
    }

    /// Returns the user's reflection for `date`, or `None` when absent.
    pub fn get_reflection(&self, user_id: &UserId, date: &str) -> Result<Option<Reflection>> {
        self.storage.get_reflection(user_id, date)
    }
}
