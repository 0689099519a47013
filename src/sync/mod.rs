//! Push/pull synchronization engine.
//!
//! Push applies a client batch item by item: decode the typed payload,
//! validate it, authorize against the owning user, resolve conflicts by
//! last-writer-wins on the client `updated_at`, run derivation for winning
//! note writes, and commit the item in its own storage transaction. A
//! failing item rolls back alone; the batch keeps going and the envelope
//! reports one result per change in order.
//!
//! Pull scans each entity type for rows with `server_timestamp` past the
//! client's checkpoint, emitting soft-deleted notes as delete deltas and
//! everything else as full upserts. Checkpoints are RFC 3339 instants; the
//! per-row monotonic `server_timestamp` makes repeated pulls converge.

pub mod types;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::Engram;
use crate::derivation::derive_note;
use crate::error::{EngramError, Result, ValidationError};
use crate::note::{validate_note_payload, Note};
use crate::reflection::{validate_reflection_payload, Reflection};
use crate::relation::Relation;
use crate::types::{NoteId, RelationId, Timestamp, UserId};

use types::{
    Change, Delta, DeltaOperation, EntityType, ItemResult, NoteDeletePayload, NotePayload,
    PullRequest, PullResponse, PushRequest, PushResponse, RelationPayload, ReflectionPayload,
    TypedChange,
};

/// Assigns the server timestamp for a row write.
///
/// Wall clock, except that a row whose stored value already reaches the
/// clock gets bumped one millisecond past it. `server_timestamp` therefore
/// never repeats or regresses for a given row, even under clock skew.
fn next_server_timestamp(prev: Option<Timestamp>) -> Timestamp {
    let now = Timestamp::now();
    match prev {
        Some(prev) if prev >= now => Timestamp::from_millis(prev.as_millis() + 1),
        _ => now,
    }
}

/// Applies a push batch for one user.
pub(crate) fn push(core: &Engram, user_id: &UserId, request: PushRequest) -> Result<PushResponse> {
    let config = core.config();

    if request.changes.is_empty() {
        return Err(ValidationError::invalid_field(
            "changes",
            "must contain at least one change",
        )
        .into());
    }
    if request.changes.len() > config.max_batch_items {
        return Err(ValidationError::batch_too_large(format!(
            "{} changes exceeds the cap of {}",
            request.changes.len(),
            config.max_batch_items
        ))
        .into());
    }

    // The byte cap is measured over the JSON-encoded change list and checked
    // before any item is applied
    let encoded_len = serde_json::to_vec(&request.changes)
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX);
    if encoded_len > config.max_batch_bytes {
        return Err(ValidationError::batch_too_large(format!(
            "{} bytes exceeds the cap of {}",
            encoded_len, config.max_batch_bytes
        ))
        .into());
    }

    info!(
        user = %user_id,
        device = %request.device_id,
        changes = request.changes.len(),
        "Push started"
    );

    let mut results = Vec::with_capacity(request.changes.len());
    let mut success_count = 0;
    let mut failure_count = 0;
    let mut max_written = None::<Timestamp>;

    for change in &request.changes {
        match apply_change(core, user_id, change) {
            Ok(written) => {
                if let Some(ts) = written {
                    max_written = Some(max_written.map_or(ts, |m| m.max(ts)));
                }
                success_count += 1;
                results.push(ItemResult {
                    entity_id: change.entity_id.clone(),
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                warn!(
                    entity_type = %change.entity_type,
                    entity_id = %change.entity_id,
                    error = %e,
                    "Push item failed"
                );
                failure_count += 1;
                results.push(ItemResult {
                    entity_id: change.entity_id.clone(),
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    // The checkpoint must cover every committed write, including rows whose
    // monotonicity bump pushed them past the wall clock
    let now = Timestamp::now();
    let checkpoint = max_written.map_or(now, |m| m.max(now));

    info!(
        user = %user_id,
        success = success_count,
        failure = failure_count,
        "Push completed"
    );

    Ok(PushResponse {
        success_count,
        failure_count,
        results,
        new_checkpoint: checkpoint.to_rfc3339(),
    })
}

/// Applies one change; returns the server timestamp it wrote, if any.
///
/// `Ok(None)` covers both no-op successes (LWW losers, idempotent repeats)
/// and hard deletes, which leave no row to pull.
fn apply_change(core: &Engram, user_id: &UserId, change: &Change) -> Result<Option<Timestamp>> {
    match TypedChange::decode(change)? {
        TypedChange::NoteUpsert(payload) => {
            apply_note_upsert(core, user_id, &change.entity_id, payload)
        }
        TypedChange::NoteDelete(payload) => {
            apply_note_delete(core, user_id, &change.entity_id, payload)
        }
        TypedChange::RelationInsert(payload) => {
            apply_relation_insert(core, user_id, &change.entity_id, payload)
        }
        TypedChange::RelationDelete => apply_relation_delete(core, user_id, &change.entity_id),
        TypedChange::ReflectionUpsert(payload) => apply_reflection_upsert(core, user_id, payload),
        TypedChange::ReflectionDelete { date } => {
            let date = date.unwrap_or_else(|| change.entity_id.clone());
            apply_reflection_delete(core, user_id, &date)
        }
    }
}

fn apply_note_upsert(
    core: &Engram,
    user_id: &UserId,
    entity_id: &str,
    payload: NotePayload,
) -> Result<Option<Timestamp>> {
    validate_note_payload(&payload)?;

    let note_id = NoteId::new(entity_id);
    let stored = core.storage().get_note(&note_id)?;

    if let Some(stored) = &stored {
        if stored.user_id != *user_id {
            return Err(EngramError::forbidden("note belongs to another user"));
        }
        // Last-writer-wins: an equal or older write is dropped, and the
        // drop is a success from the client's perspective
        if payload.updated_at <= stored.updated_at {
            debug!(note = %note_id, "Dropping stale note write");
            return Ok(None);
        }
    }

    let derivation = derive_note(
        core.embedder(),
        core.keywords(),
        &payload.body,
        core.config().keyword_top_k,
    );

    let server_timestamp = next_server_timestamp(stored.as_ref().map(|s| s.server_timestamp));
    // A tombstone carried by the upsert moves the LWW pivot to the delete
    // instant, exactly like the delete operation does; payload validation
    // already guarantees deleted_at >= updated_at
    let updated_at = payload.deleted_at.unwrap_or(payload.updated_at);
    let note = Note {
        id: note_id.clone(),
        user_id: user_id.clone(),
        body: payload.body,
        importance: payload.importance,
        source_url: payload.source_url,
        image_path: payload.image_path,
        embedding: derivation.embedding.clone(),
        // The original creation instant survives updates
        created_at: stored
            .as_ref()
            .map_or(payload.created_at, |s| s.created_at),
        updated_at,
        deleted_at: payload.deleted_at,
        server_timestamp,
    };

    core.storage().save_note(
        &note,
        stored.as_ref().map(|s| s.server_timestamp),
        &derivation.keywords,
    )?;

    // Keep the vector index in step with the accepted row
    if note.deleted_at.is_none() {
        if let Some(embedding) = &note.embedding {
            core.vector_upsert(user_id, &note.id, embedding)?;
        } else {
            core.vector_remove(user_id, &note.id)?;
        }
    } else {
        core.vector_remove(user_id, &note.id)?;
    }

    Ok(Some(server_timestamp))
}

fn apply_note_delete(
    core: &Engram,
    user_id: &UserId,
    entity_id: &str,
    payload: NoteDeletePayload,
) -> Result<Option<Timestamp>> {
    let note_id = NoteId::new(entity_id);
    let Some(stored) = core.storage().get_note(&note_id)? else {
        debug!(note = %note_id, "Delete for unknown note is a no-op");
        return Ok(None);
    };

    if stored.user_id != *user_id {
        return Err(EngramError::forbidden("note belongs to another user"));
    }

    let deleted_at = payload.deleted_at.unwrap_or_else(Timestamp::now);

    // The tombstone competes under the same last-writer-wins rule
    if deleted_at <= stored.updated_at {
        debug!(note = %note_id, "Dropping stale note delete");
        return Ok(None);
    }

    let server_timestamp = next_server_timestamp(Some(stored.server_timestamp));
    let prev_server_timestamp = stored.server_timestamp;

    // Writing the delete instant into updated_at as well makes later stale
    // updates lose against the tombstone with the one uniform comparison
    let mut note = stored;
    note.deleted_at = Some(deleted_at);
    note.updated_at = deleted_at;
    note.server_timestamp = server_timestamp;

    // The keyword link set survives the tombstone; derivation only reruns
    // on upserts
    let links = core.storage().note_keywords(&note.id)?;
    core.storage()
        .save_note(&note, Some(prev_server_timestamp), &links)?;

    core.vector_remove(user_id, &note.id)?;

    Ok(Some(server_timestamp))
}

fn apply_relation_insert(
    core: &Engram,
    user_id: &UserId,
    entity_id: &str,
    payload: RelationPayload,
) -> Result<Option<Timestamp>> {
    let relation_id = RelationId::new(entity_id);

    // Idempotent on id: a duplicate insert is a no-op success
    if core.storage().get_relation(&relation_id)?.is_some() {
        debug!(relation = %relation_id, "Relation already exists, skipping");
        return Ok(None);
    }

    let from_note = core.storage().get_note(&NoteId::new(&payload.from_note_id))?;
    let to_note = core.storage().get_note(&NoteId::new(&payload.to_note_id))?;
    let owned = |note: &Option<Note>| {
        note.as_ref()
            .is_some_and(|n| n.user_id == *user_id)
    };
    if !owned(&from_note) || !owned(&to_note) {
        return Err(EngramError::forbidden(
            "relation endpoints must exist and belong to the user",
        ));
    }

    let server_timestamp = next_server_timestamp(None);
    let relation = Relation {
        id: relation_id,
        user_id: user_id.clone(),
        from_note_id: NoteId::new(payload.from_note_id),
        to_note_id: NoteId::new(payload.to_note_id),
        relation_type: payload.relation_type,
        created_at: payload.created_at,
        server_timestamp,
    };

    core.storage().save_relation(&relation)?;
    Ok(Some(server_timestamp))
}

fn apply_relation_delete(
    core: &Engram,
    user_id: &UserId,
    entity_id: &str,
) -> Result<Option<Timestamp>> {
    let relation_id = RelationId::new(entity_id);
    let Some(stored) = core.storage().get_relation(&relation_id)? else {
        debug!(relation = %relation_id, "Delete for unknown relation is a no-op");
        return Ok(None);
    };

    if stored.user_id != *user_id {
        return Err(EngramError::forbidden("relation belongs to another user"));
    }

    core.storage().delete_relation(&relation_id)?;
    Ok(None)
}

fn apply_reflection_upsert(
    core: &Engram,
    user_id: &UserId,
    payload: ReflectionPayload,
) -> Result<Option<Timestamp>> {
    validate_reflection_payload(&payload)?;

    let stored = core.storage().get_reflection(user_id, &payload.date)?;

    if let Some(stored) = &stored {
        if payload.updated_at <= stored.updated_at {
            debug!(date = %payload.date, "Dropping stale reflection write");
            return Ok(None);
        }
    }

    let server_timestamp = next_server_timestamp(stored.as_ref().map(|s| s.server_timestamp));
    let reflection = Reflection {
        user_id: user_id.clone(),
        date: payload.date,
        content: payload.content,
        created_at: stored
            .as_ref()
            .map_or(payload.created_at, |s| s.created_at),
        updated_at: payload.updated_at,
        server_timestamp,
    };

    core.storage().save_reflection(
        &reflection,
        stored.as_ref().map(|s| s.server_timestamp),
    )?;

    Ok(Some(server_timestamp))
}

fn apply_reflection_delete(
    core: &Engram,
    user_id: &UserId,
    date: &str,
) -> Result<Option<Timestamp>> {
    let removed = core.storage().delete_reflection(user_id, date)?;
    if !removed {
        debug!(date = %date, "Delete for unknown reflection is a no-op");
    }
    Ok(None)
}

/// Serves a checkpoint-bounded delta pull for one user.
pub(crate) fn pull(core: &Engram, user_id: &UserId, request: PullRequest) -> Result<PullResponse> {
    let checkpoint = match &request.checkpoint {
        None => None,
        Some(raw) => Some(
            Timestamp::parse_rfc3339(raw)
                .ok_or_else(|| ValidationError::invalid_checkpoint(raw.clone()))?,
        ),
    };

    info!(
        user = %user_id,
        device = %request.device_id,
        checkpoint = ?request.checkpoint,
        "Pull started"
    );

    let limit = core.config().pull_page_size;
    let storage = core.storage();

    let notes = storage.notes_since(user_id, checkpoint, limit)?;
    let relations = storage.relations_since(user_id, checkpoint, limit)?;
    let reflections = storage.reflections_since(user_id, checkpoint, limit)?;

    let has_more =
        notes.len() >= limit || relations.len() >= limit || reflections.len() >= limit;

    let mut max_seen = checkpoint;
    let mut observe = |ts: Timestamp, max_seen: &mut Option<Timestamp>| {
        *max_seen = Some(max_seen.map_or(ts, |m| m.max(ts)));
    };

    let mut changes = Vec::with_capacity(notes.len() + relations.len() + reflections.len());

    for note in notes {
        observe(note.server_timestamp, &mut max_seen);
        let (operation, data) = if note.is_deleted() {
            (DeltaOperation::Delete, None)
        } else {
            (
                DeltaOperation::Upsert,
                Some(json!({
                    "id": note.id.as_str(),
                    "body": note.body,
                    "importance": note.importance,
                    "source_url": note.source_url,
                    "image_path": note.image_path,
                    "created_at": note.created_at.to_rfc3339(),
                    "updated_at": note.updated_at.to_rfc3339(),
                    "deleted_at": serde_json::Value::Null,
                })),
            )
        };
        changes.push(Delta {
            entity_type: EntityType::Note,
            entity_id: note.id.0,
            operation,
            data,
            updated_at: note.updated_at,
            server_timestamp: note.server_timestamp,
        });
    }

    for relation in relations {
        observe(relation.server_timestamp, &mut max_seen);
        changes.push(Delta {
            entity_type: EntityType::Relation,
            entity_id: relation.id.as_str().to_owned(),
            operation: DeltaOperation::Upsert,
            data: Some(json!({
                "id": relation.id.as_str(),
                "from_note_id": relation.from_note_id.as_str(),
                "to_note_id": relation.to_note_id.as_str(),
                "relation_type": relation.relation_type,
                "created_at": relation.created_at.to_rfc3339(),
            })),
            // Relations are immutable, so creation is the only modification
            updated_at: relation.created_at,
            server_timestamp: relation.server_timestamp,
        });
    }

    for reflection in reflections {
        observe(reflection.server_timestamp, &mut max_seen);
        changes.push(Delta {
            entity_type: EntityType::Reflection,
            entity_id: reflection.date.clone(),
            operation: DeltaOperation::Upsert,
            data: Some(json!({
                "date": reflection.date,
                "content": reflection.content,
                "created_at": reflection.created_at.to_rfc3339(),
                "updated_at": reflection.updated_at.to_rfc3339(),
            })),
            updated_at: reflection.updated_at,
            server_timestamp: reflection.server_timestamp,
        });
    }

    // With no rows and no input checkpoint, the epoch keeps the next pull a
    // full (safe) rescan; advancing to the wall clock here could skip
    // writes racing this scan
    let new_checkpoint = max_seen.unwrap_or_else(Timestamp::epoch);
    let total_changes = changes.len();

    info!(
        user = %user_id,
        changes = total_changes,
        has_more = has_more,
        "Pull completed"
    );

    Ok(PullResponse {
        has_more,
        changes,
        new_checkpoint: new_checkpoint.to_rfc3339(),
        total_changes,
    })
}
