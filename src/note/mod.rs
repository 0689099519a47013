//! Note management module.
//!
//! A **note** is the primary user-authored entity in Engram. Notes arrive
//! through the sync engine (devices push inserts, updates, and soft
//! deletes), get enriched by the derivation pipeline, and feed the
//! recommendation and weekly-report engines.

pub mod types;

pub use types::{Note, MAX_IMPORTANCE, MIN_IMPORTANCE};

use crate::error::{EngramError, ValidationError};
use crate::sync::types::NotePayload;

/// Validates a decoded note payload before it is applied.
///
/// # Rules
///
/// - `importance`: 1..=5
/// - `updated_at` >= `created_at`
/// - `deleted_at` (when present) >= `updated_at`
///
/// An empty `body` is allowed: brief captures are legitimate notes, and the
/// derivation pipeline degrades to a null embedding for them.
pub(crate) fn validate_note_payload(payload: &NotePayload) -> Result<(), EngramError> {
    if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&payload.importance) {
        return Err(ValidationError::invalid_field(
            "importance",
            format!(
                "must be between {} and {}, got {}",
                MIN_IMPORTANCE, MAX_IMPORTANCE, payload.importance
            ),
        )
        .into());
    }

    if payload.updated_at < payload.created_at {
        return Err(ValidationError::invalid_field(
            "updated_at",
            "must not precede created_at",
        )
        .into());
    }

    if let Some(deleted_at) = payload.deleted_at {
        if deleted_at < payload.updated_at {
            return Err(ValidationError::invalid_field(
                "deleted_at",
                "must not precede updated_at",
            )
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn valid_payload() -> NotePayload {
        NotePayload {
            body: "note body".to_string(),
            importance: 3,
            source_url: None,
            image_path: None,
            created_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(2000),
            deleted_at: None,
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        assert!(validate_note_payload(&valid_payload()).is_ok());
    }

    #[test]
    fn test_empty_body_allowed() {
        let mut payload = valid_payload();
        payload.body = String::new();
        assert!(validate_note_payload(&payload).is_ok());
    }

    #[test]
    fn test_importance_zero_rejected() {
        let mut payload = valid_payload();
        payload.importance = 0;
        let err = validate_note_payload(&payload).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_importance_six_rejected() {
        let mut payload = valid_payload();
        payload.importance = 6;
        assert!(validate_note_payload(&payload).is_err());
    }

    #[test]
    fn test_updated_before_created_rejected() {
        let mut payload = valid_payload();
        payload.updated_at = Timestamp::from_millis(500);
        assert!(validate_note_payload(&payload).is_err());
    }

    #[test]
    fn test_deleted_before_updated_rejected() {
        let mut payload = valid_payload();
        payload.deleted_at = Some(Timestamp::from_millis(1500));
        assert!(validate_note_payload(&payload).is_err());
    }

    #[test]
    fn test_deleted_at_equal_updated_at_allowed() {
        let mut payload = valid_payload();
        payload.deleted_at = Some(payload.updated_at);
        assert!(validate_note_payload(&payload).is_ok());
    }
}
