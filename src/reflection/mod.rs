//! Reflection management module.
//!
//! A **reflection** is a free-form daily journal entry, one per user per
//! calendar day. Under sync, insert and update are equivalent upserts on
//! the `(user_id, date)` key.

pub mod types;

pub use types::Reflection;

use crate::error::{EngramError, ValidationError};
use crate::sync::types::ReflectionPayload;

/// Validates a decoded reflection payload before it is applied.
///
/// # Rules
///
/// - `date`: a real calendar day in `YYYY-MM-DD` form
/// - `updated_at` >= `created_at`
pub(crate) fn validate_reflection_payload(
    payload: &ReflectionPayload,
) -> Result<(), EngramError> {
    if chrono::NaiveDate::parse_from_str(&payload.date, "%Y-%m-%d").is_err() {
        return Err(ValidationError::invalid_field(
            "date",
            format!("must be a YYYY-MM-DD calendar day, got '{}'", payload.date),
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

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn valid_payload() -> ReflectionPayload {
        ReflectionPayload {
            date: "2025-01-10".to_string(),
            content: "content".to_string(),
            created_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(2000),
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        assert!(validate_reflection_payload(&valid_payload()).is_ok());
    }

    #[test]
    fn test_bad_date_rejected() {
        let mut payload = valid_payload();
        payload.date = "2025-13-40".to_string();
        assert!(validate_reflection_payload(&payload).is_err());

        payload.date = "not-a-date".to_string();
        assert!(validate_reflection_payload(&payload).is_err());
    }

    #[test]
    fn test_updated_before_created_rejected() {
        let mut payload = valid_payload();
        payload.updated_at = Timestamp::from_millis(10);
        assert!(validate_reflection_payload(&payload).is_err());
    }
}
