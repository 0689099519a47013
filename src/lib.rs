//! # Engram
//!
//! Sync and recommendation core for a multi-device personal-notes platform.
//!
//! Engram keeps many offline-capable devices converged on one authoritative
//! copy of a user's notes, inter-note relations, and daily reflections, and
//! derives value from the corpus: semantic embeddings, keyword tags, hybrid
//! related-note recommendations, and weekly insight reports.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use engram::{Engram, Config};
//! use engram::sync::types::{PushRequest, PullRequest};
//!
//! // Open or create a database
//! let db = Engram::open("./engram.db", Config::default())?;
//!
//! // Register a user (ids normally come from the auth boundary)
//! let user = db.register_user("ada@example.com", "argon2-hash")?;
//!
//! // Devices push batches of changes and pull deltas back
//! let response = db.push(&user.id, push_request)?;
//! let deltas = db.pull(&user.id, PullRequest { device_id, checkpoint: None })?;
//!
//! // Derived value on top of the synced corpus
//! let related = db.recommend(&user.id, &note_id, 10)?;
//! let report = db.weekly_report(&user.id, "2025-W02", false)?;
//!
//! db.close()?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Sync
//!
//! Devices accumulate local mutations and reconcile through a push/pull
//! delta protocol. Conflicts resolve by last-writer-wins on the client
//! `updated_at`; each push item commits independently; checkpoints are
//! opaque monotonic markers backed by per-row server timestamps.
//!
//! ### Derivation
//!
//! Every accepted note write is embedded and tagged with keywords in the
//! same atomic storage transaction. Model failures degrade gracefully: the
//! note persists with a null embedding.
//!
//! ### Recommendations & Reports
//!
//! Recommendations combine embedding cosine similarity, keyword Jaccard
//! overlap, and temporal proximity. Weekly reports cluster a week's notes,
//! aggregate keywords, diff against the prior week, and suggest cross-note
//! connections.
//!
//! ## Thread Safety
//!
//! [`Engram`] is `Send + Sync` and can be shared across threads using
//! `Arc`. Row writes serialize in the storage engine, which keeps per-note
//! conflict resolution linearizable.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod db;
mod derivation;
mod error;
mod types;

pub mod embedding;
pub mod keyword;
pub mod storage;

// Domain modules
mod note;
mod reflection;
mod relation;
mod user;

/// Vector index module for HNSW-based approximate nearest neighbor search.
pub mod vector;

/// Push/pull synchronization engine and wire types.
pub mod sync;

/// Hybrid recommendation engine.
pub mod recommend;

/// Weekly report engine.
pub mod report;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main database interface
pub use db::Engram;

// Configuration
pub use config::{ClusteringConfig, Config, HnswConfig, RecommendationConfig};

// Error handling
pub use error::{EngramError, NotFoundError, Result, StorageError, ValidationError};

// Core types
pub use types::{DeviceId, Embedding, NoteId, RelationId, Timestamp, UserId};

// Domain types
pub use note::Note;
pub use reflection::Reflection;
pub use relation::{Relation, RelationKind};
pub use user::User;

// Derivation output (for embedding/keyword service implementors)
pub use derivation::NoteDerivation;

// Storage (for advanced users)
pub use storage::DatabaseMetadata;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common Engram usage.
///
/// ```rust
/// use engram::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::db::Engram;
    pub use crate::error::{EngramError, Result};
    pub use crate::note::Note;
    pub use crate::sync::types::{PullRequest, PushRequest};
    pub use crate::types::{DeviceId, NoteId, Timestamp, UserId};
}
