//! HNSW note index implementation using hnsw_rs.
//!
//! Wraps `hnsw_rs::Hnsw<f32, DistCosine>` with:
//! - Bidirectional `NoteId` ↔ `usize` ID mapping
//! - Soft-delete via `HashSet` + post-filtered search
//! - Replace-on-update (a re-derived embedding gets a fresh internal slot;
//!   the old slot joins the deleted set, since HNSW graphs cannot mutate a
//!   stored vector in place)
//!
//! # Thread Safety
//!
//! The `hnsw_rs::Hnsw` graph uses `parking_lot::RwLock` internally,
//! so `insert()` takes `&self`. Our mapping state is protected by
//! `std::sync::RwLock`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use hnsw_rs::prelude::*;

use crate::config::HnswConfig;
use crate::error::{EngramError, Result};
use crate::types::NoteId;

/// HNSW vector index over one user's notes.
///
/// Per-user instances give complete isolation: a neighbor query can only
/// ever surface ids that were inserted for that user.
pub struct NoteIndex {
    /// The underlying HNSW graph. Uses `'static` lifetime because
    /// all data is heap-owned (not memory-mapped).
    hnsw: Hnsw<'static, f32, DistCosine>,

    /// Mutable mapping state protected by RwLock.
    state: RwLock<IndexState>,

    /// Embedding dimension (must match all inserted vectors).
    dimension: usize,
}

/// Internal mutable state for ID mapping and soft-deletion.
#[derive(Debug)]
struct IndexState {
    /// Forward map: NoteId → current internal usize ID.
    id_to_internal: HashMap<NoteId, usize>,

    /// Reverse map: internal usize ID → NoteId.
    /// Uses Vec for O(1) lookup by index; superseded slots stay mapped so
    /// stale graph hits can still be resolved (and filtered as deleted).
    internal_to_id: Vec<NoteId>,

    /// Set of retired internal IDs (excluded from search results).
    deleted: HashSet<usize>,

    /// Next internal ID to assign (monotonically increasing).
    next_id: usize,
}

impl NoteIndex {
    /// Creates a new empty index.
    ///
    /// # Arguments
    ///
    /// * `dimension` - Expected embedding dimension (validated on insert)
    /// * `config` - HNSW tuning parameters
    pub fn new(dimension: usize, config: &HnswConfig) -> Self {
        let hnsw = Hnsw::new(
            config.max_nb_connection,
            config.max_elements,
            config.max_layer,
            config.ef_construction,
            DistCosine,
        );

        Self {
            hnsw,
            state: RwLock::new(IndexState {
                id_to_internal: HashMap::new(),
                internal_to_id: Vec::new(),
                deleted: HashSet::new(),
                next_id: 0,
            }),
            dimension,
        }
    }

    /// Inserts or replaces a note's embedding.
    ///
    /// On replace, the previous internal slot is retired and the new vector
    /// gets a fresh slot; searches only ever see the latest embedding.
    pub fn upsert(&self, note_id: &NoteId, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EngramError::vector(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| EngramError::vector("Index state lock poisoned"))?;

        if let Some(&old_internal) = state.id_to_internal.get(note_id) {
            state.deleted.insert(old_internal);
        }

        let internal_id = state.next_id;
        state.next_id += 1;
        state.id_to_internal.insert(note_id.clone(), internal_id);
        state.internal_to_id.push(note_id.clone());
        state.deleted.remove(&internal_id);

        // Drop the lock before hnsw insert (which acquires its own lock)
        drop(state);

        self.hnsw.insert((embedding, internal_id));

        Ok(())
    }

    /// Retires a note from the index.
    ///
    /// The vector remains in the graph but is excluded from search results.
    /// Idempotent: unknown ids are ignored.
    pub fn remove(&self, note_id: &NoteId) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| EngramError::vector("Index state lock poisoned"))?;

        if let Some(internal_id) = state.id_to_internal.remove(note_id) {
            state.deleted.insert(internal_id);
        }

        Ok(())
    }

    /// Searches for the `k` nearest live notes.
    ///
    /// Returns `(NoteId, similarity)` pairs sorted by similarity descending,
    /// where similarity is `1 − cosine distance` clamped to `[0, 1]`.
    /// Retired slots are filtered after the graph search; the graph is
    /// over-queried by the retired count so filtering cannot starve `k`.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<(NoteId, f32)>> {
        if query.len() != self.dimension {
            return Err(EngramError::vector(format!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let state = self
            .state
            .read()
            .map_err(|_| EngramError::vector("Index state lock poisoned"))?;

        if state.id_to_internal.is_empty() {
            return Ok(Vec::new());
        }

        let over_query = k.saturating_add(state.deleted.len());
        let ef = ef_search.max(over_query);
        let neighbours = self.hnsw.search(query, over_query, ef);

        let mut results = Vec::with_capacity(k);
        for neighbour in neighbours {
            if results.len() >= k {
                break;
            }
            if state.deleted.contains(&neighbour.d_id) {
                continue;
            }
            let Some(note_id) = state.internal_to_id.get(neighbour.d_id) else {
                continue;
            };
            // Skip stale slots whose note has since been re-embedded
            if state.id_to_internal.get(note_id) != Some(&neighbour.d_id) {
                continue;
            }
            let similarity = (1.0 - neighbour.distance).clamp(0.0, 1.0);
            results.push((note_id.clone(), similarity));
        }

        Ok(results)
    }

    /// Number of live (non-retired) notes in the index.
    pub fn active_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.id_to_internal.len())
            .unwrap_or(0)
    }

    /// Returns true when a note currently has a live vector.
    pub fn contains(&self, note_id: &NoteId) -> bool {
        self.state
            .read()
            .map(|state| state.id_to_internal.contains_key(note_id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for NoteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteIndex")
            .field("dimension", &self.dimension)
            .field("active_count", &self.active_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIM: usize = 16;

    fn index() -> NoteIndex {
        NoteIndex::new(DIM, &HnswConfig::default())
    }

    /// Deterministic embedding from a seed; close seeds → similar vectors.
    fn make_embedding(seed: u64) -> Vec<f32> {
        (0..DIM)
            .map(|i| (seed as f32 * 0.1 + i as f32 * 0.01).sin())
            .collect()
    }

    #[test]
    fn test_upsert_and_search() {
        let index = index();
        for seed in 0..10u64 {
            index
                .upsert(&NoteId::new(format!("n{seed}")), &make_embedding(seed))
                .unwrap();
        }

        let results = index.search(&make_embedding(5), 3, 50).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0.as_str(), "n5");
        assert!(results[0].1 > 0.99);

        // Sorted by similarity descending
        for window in results.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let index = index();
        let err = index.upsert(&NoteId::new("n1"), &[0.5; 4]).unwrap_err();
        assert!(err.is_vector());

        index.upsert(&NoteId::new("n1"), &make_embedding(1)).unwrap();
        assert!(index.search(&[0.5; 4], 3, 50).is_err());
    }

    #[test]
    fn test_removed_notes_filtered() {
        let index = index();
        for seed in 0..10u64 {
            index
                .upsert(&NoteId::new(format!("n{seed}")), &make_embedding(seed))
                .unwrap();
        }

        index.remove(&NoteId::new("n5")).unwrap();

        let results = index.search(&make_embedding(5), 10, 50).unwrap();
        assert!(results.iter().all(|(id, _)| id.as_str() != "n5"));
        assert_eq!(index.active_count(), 9);
        assert!(!index.contains(&NoteId::new("n5")));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let index = index();
        index.remove(&NoteId::new("missing")).unwrap();
        index.upsert(&NoteId::new("n1"), &make_embedding(1)).unwrap();
        index.remove(&NoteId::new("n1")).unwrap();
        index.remove(&NoteId::new("n1")).unwrap();
        assert_eq!(index.active_count(), 0);
    }

    #[test]
    fn test_upsert_replaces_embedding() {
        let index = index();
        for seed in 0..8u64 {
            index
                .upsert(&NoteId::new(format!("n{seed}")), &make_embedding(seed))
                .unwrap();
        }

        // Move n0 near seed 100
        index.upsert(&NoteId::new("n0"), &make_embedding(100)).unwrap();

        let results = index.search(&make_embedding(100), 1, 50).unwrap();
        assert_eq!(results[0].0.as_str(), "n0");

        // No duplicate hits for the re-embedded note
        let all = index.search(&make_embedding(0), 10, 50).unwrap();
        let n0_hits = all.iter().filter(|(id, _)| id.as_str() == "n0").count();
        assert!(n0_hits <= 1);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = index();
        assert!(index.search(&make_embedding(1), 5, 50).unwrap().is_empty());
    }

    #[test]
    fn test_index_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoteIndex>();
    }
}
