//! Vector index module for HNSW-based approximate nearest neighbor search.
//!
//! Each user gets an independent [`NoteIndex`] over their notes' embeddings,
//! giving the recommendation engine user-scoped neighbor retrieval with no
//! cross-user leakage by construction. Indexes are rebuilt from stored
//! embeddings when the database opens; the store remains the source of
//! truth.

mod hnsw;

pub use hnsw::NoteIndex;
