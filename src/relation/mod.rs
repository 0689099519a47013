//! Relation management module.
//!
//! A **relation** is a directed, typed edge between two notes of the same
//! user. Relations are immutable: sync accepts only insert (idempotent on
//! id) and hard delete.

pub mod types;

pub use types::{Relation, RelationKind};
