//! Hybrid recommendation engine.
//!
//! For a target note, candidates come from the user's vector index (up to
//! `max_candidates` cosine neighbors). Each candidate is scored by a
//! weighted combination:
//!
//! ```text
//! score = 0.6·embedding_similarity + 0.3·keyword_jaccard + 0.1·temporal
//! ```
//!
//! with `temporal = exp(−Δdays / 30)`. Candidates below the score threshold
//! are dropped; the survivors are ranked score-descending with recency and
//! id tie-breaks and explained with human-readable reason clauses.

pub mod types;

pub use types::{RecommendationResult, RecommendedNote};

use std::time::Instant;

use tracing::{debug, info};

use crate::db::Engram;
use crate::error::{NotFoundError, Result, ValidationError};
use crate::note::Note;
use crate::types::{NoteId, UserId};

/// Seconds per day, for the temporal decay exponent.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Temporal decay constant in days.
const DECAY_DAYS: f64 = 30.0;

/// Jaccard similarity over lowercased keyword-name sets.
///
/// Zero when either side is empty.
fn keyword_jaccard(target: &[String], candidate: &[String]) -> f32 {
    if target.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let target_set: std::collections::HashSet<String> =
        target.iter().map(|k| k.to_lowercase()).collect();
    let candidate_set: std::collections::HashSet<String> =
        candidate.iter().map(|k| k.to_lowercase()).collect();

    let intersection = target_set.intersection(&candidate_set).count();
    let union = target_set.union(&candidate_set).count();

    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Temporal proximity score: `exp(−Δdays / 30)`.
fn temporal_score(target: &Note, candidate: &Note) -> f32 {
    let diff_ms = (target.created_at.as_millis() - candidate.created_at.as_millis()).abs();
    let days = diff_ms as f64 / 1000.0 / SECONDS_PER_DAY;
    (-days / DECAY_DAYS).exp() as f32
}

/// Composes the justification clauses for one candidate.
fn compose_reason(embedding_sim: f32, temporal: f32, common_keywords: &[String]) -> String {
    let mut clauses: Vec<String> = Vec::with_capacity(3);

    if embedding_sim > 0.7 {
        clauses.push("content highly similar".to_string());
    } else if embedding_sim > 0.5 {
        clauses.push("related topic".to_string());
    }

    if common_keywords.len() >= 3 {
        clauses.push(format!(
            "shared keywords: {}",
            common_keywords[..3].join(", ")
        ));
    } else if !common_keywords.is_empty() {
        clauses.push(format!("keywords {} related", common_keywords.join(", ")));
    }

    if temporal > 0.8 {
        clauses.push("recent note".to_string());
    }

    if clauses.is_empty() {
        clauses.push("similar context".to_string());
    }

    clauses.join(" | ")
}

/// First 100 characters of a body, on character boundaries.
fn body_preview(body: &str) -> String {
    body.chars().take(100).collect()
}

/// Returns the top-k related notes for `(user, note)`.
pub(crate) fn recommend(
    core: &Engram,
    user_id: &UserId,
    note_id: &NoteId,
    k: usize,
) -> Result<RecommendationResult> {
    if !(1..=50).contains(&k) {
        return Err(ValidationError::invalid_field(
            "k",
            format!("must be between 1 and 50, got {k}"),
        )
        .into());
    }

    // Missing, foreign-owned, and soft-deleted all answer "not found" so
    // the endpoint never leaks existence across users
    let target = core
        .storage()
        .get_note(note_id)?
        .filter(|note| note.user_id == *user_id && !note.is_deleted())
        .ok_or_else(|| NotFoundError::note(note_id))?;

    let Some(target_embedding) = target.embedding.clone() else {
        debug!(note = %note_id, "Target has no embedding, returning empty result");
        return Ok(RecommendationResult {
            note_id: note_id.as_str().to_owned(),
            recommendations: Vec::new(),
            total_candidates: 0,
            processing_time_ms: 0,
        });
    };

    let start = Instant::now();
    let rec_config = &core.config().recommendation;

    // One extra slot because the target itself is the nearest neighbor
    let neighbours = core.vector_search(
        user_id,
        &target_embedding,
        rec_config.max_candidates + 1,
    )?;
    let candidates: Vec<(NoteId, f32)> = neighbours
        .into_iter()
        .filter(|(id, _)| id != note_id)
        .take(rec_config.max_candidates)
        .collect();
    let total_candidates = candidates.len();

    // Ranked order: common_keywords surface in the target's keyword ranking
    let mut target_links = core.storage().note_keywords(note_id)?;
    target_links.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    let target_keywords: Vec<String> =
        target_links.into_iter().map(|(name, _)| name).collect();

    let mut recommendations = Vec::new();
    for (candidate_id, embedding_sim) in candidates {
        let Some(candidate) = core.storage().get_note(&candidate_id)? else {
            continue;
        };
        if candidate.is_deleted() || candidate.user_id != *user_id {
            continue;
        }

        let candidate_keywords: Vec<String> = core
            .storage()
            .note_keywords(&candidate_id)?
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        let embedding_sim = embedding_sim.clamp(0.0, 1.0);
        let keyword_sim = keyword_jaccard(&target_keywords, &candidate_keywords);
        let temporal = temporal_score(&target, &candidate);

        let score = rec_config.embedding_weight * embedding_sim
            + rec_config.keyword_weight * keyword_sim
            + rec_config.temporal_weight * temporal;

        if score < rec_config.min_score {
            continue;
        }

        // Shared keywords keep the target's ranking order (case-insensitive
        // match, target's spelling)
        let candidate_lower: std::collections::HashSet<String> = candidate_keywords
            .iter()
            .map(|kw| kw.to_lowercase())
            .collect();
        let common_keywords: Vec<String> = target_keywords
            .iter()
            .filter(|kw| candidate_lower.contains(&kw.to_lowercase()))
            .cloned()
            .collect();

        let reason = compose_reason(embedding_sim, temporal, &common_keywords);

        recommendations.push(RecommendedNote {
            note_id: candidate.id.as_str().to_owned(),
            body_preview: body_preview(&candidate.body),
            score,
            reason,
            created_at: candidate.created_at,
            common_keywords,
        });
    }

    // Score descending; ties break to the more recent note, then id
    recommendations.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.note_id.cmp(&b.note_id))
    });
    recommendations.truncate(k);

    let processing_time_ms = start.elapsed().as_millis() as u64;

    info!(
        note = %note_id,
        returned = recommendations.len(),
        candidates = total_candidates,
        elapsed_ms = processing_time_ms,
        "Recommendations generated"
    );

    Ok(RecommendationResult {
        note_id: note_id.as_str().to_owned(),
        recommendations,
        total_candidates,
        processing_time_ms,
    })
}
