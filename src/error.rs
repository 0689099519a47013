//! Error types for Engram.
//!
//! Engram uses a hierarchical error system:
//! - `EngramError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`) provide detail
//!
//! Boundary mapping (for the HTTP layer hosting this core): `Validation`
//! maps to 400/422, `NotFound` and `Forbidden` both map to 404 (so foreign
//! ownership does not leak existence), `Conflict` maps to 409, `Storage`
//! maps to 500. Embedding and extraction failures are recovered inside the
//! engine and never reach a response.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Engram operations.
pub type Result<T> = std::result::Result<T, EngramError>;

/// Top-level error enum for all Engram operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum EngramError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Unique-key violation (e.g., duplicate email).
    #[error("Conflict: {reason}")]
    Conflict {
        /// Description of the conflicting key.
        reason: String,
    },

    /// The authenticated user does not own the referenced entity.
    #[error("Access denied: {reason}")]
    Forbidden {
        /// Description of the denied access.
        reason: String,
    },

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding generation/validation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index error (HNSW operations).
    #[error("Vector index error: {0}")]
    Vector(String),
}

impl EngramError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a conflict error with the given reason.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Creates an access-denied error with the given reason.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a vector index error with the given message.
    pub fn vector(msg: impl Into<String>) -> Self {
        Self::Vector(msg.into())
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if this is an access-denied error.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Returns true if this is a vector index error.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database file not found at expected path.
    #[error("Database not found: {0}")]
    DatabaseNotFound(PathBuf),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

// Convert bincode errors to StorageError
impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to EngramError for convenience
impl From<redb::Error> for EngramError {
    fn from(err: redb::Error) -> Self {
        EngramError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for EngramError {
    fn from(err: redb::DatabaseError) -> Self {
        EngramError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for EngramError {
    fn from(err: redb::TransactionError) -> Self {
        EngramError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for EngramError {
    fn from(err: redb::CommitError) -> Self {
        EngramError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for EngramError {
    fn from(err: redb::TableError) -> Self {
        EngramError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for EngramError {
    fn from(err: redb::StorageError) -> Self {
        EngramError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for EngramError {
    fn from(err: bincode::Error) -> Self {
        EngramError::Storage(StorageError::from(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension from configuration.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// A push payload could not be decoded into its typed shape.
    #[error("Malformed payload: {reason}")]
    MalformedPayload {
        /// Decoder message (includes the missing/invalid field).
        reason: String,
    },

    /// A sync batch exceeds the item-count or byte cap.
    #[error("Batch too large: {reason}")]
    BatchTooLarge {
        /// Which cap was exceeded and by how much.
        reason: String,
    },

    /// A checkpoint string could not be parsed.
    #[error("Invalid checkpoint: {value}")]
    InvalidCheckpoint {
        /// The rejected checkpoint value.
        value: String,
    },

    /// A week key does not match `YYYY-WNN` or is out of range.
    #[error("Invalid week key: {value}")]
    InvalidWeekKey {
        /// The rejected week key.
        value: String,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a malformed payload error.
    pub fn malformed_payload(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Creates a batch too large error.
    pub fn batch_too_large(reason: impl Into<String>) -> Self {
        Self::BatchTooLarge {
            reason: reason.into(),
        }
    }

    /// Creates an invalid checkpoint error.
    pub fn invalid_checkpoint(value: impl Into<String>) -> Self {
        Self::InvalidCheckpoint {
            value: value.into(),
        }
    }

    /// Creates an invalid week key error.
    pub fn invalid_week_key(value: impl Into<String>) -> Self {
        Self::InvalidWeekKey {
            value: value.into(),
        }
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// User with given ID not found.
    #[error("User not found: {0}")]
    User(String),

    /// Note with given ID not found (or deleted, or foreign-owned).
    #[error("Note not found: {0}")]
    Note(String),

    /// Relation with given ID not found.
    #[error("Relation not found: {0}")]
    Relation(String),

    /// Reflection not found for the given user/date pair.
    #[error("Reflection not found: {0}")]
    Reflection(String),

    /// No notes exist in the requested report window.
    #[error("No notes found for week {0}")]
    WeekEmpty(String),
}

impl NotFoundError {
    /// Creates a user not found error.
    pub fn user(id: impl ToString) -> Self {
        Self::User(id.to_string())
    }

    /// Creates a note not found error.
    pub fn note(id: impl ToString) -> Self {
        Self::Note(id.to_string())
    }

    /// Creates a relation not found error.
    pub fn relation(id: impl ToString) -> Self {
        Self::Relation(id.to_string())
    }

    /// Creates a reflection not found error.
    pub fn reflection(id: impl ToString) -> Self {
        Self::Reflection(id.to_string())
    }

    /// Creates an empty-week error.
    pub fn week_empty(week_key: impl ToString) -> Self {
        Self::WeekEmpty(week_key.to_string())
    }
}
