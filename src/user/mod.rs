//! User account module.
//!
//! Users own all other entities. The core handles registration bookkeeping
//! (unique email, activation flag); authentication itself lives at the host
//! boundary.

pub mod types;

pub use types::User;

use crate::error::{EngramError, ValidationError};

/// Validates registration input.
///
/// The email check is deliberately shallow (non-empty, one `@`, no
/// whitespace): real deliverability verification belongs to the boundary.
pub(crate) fn validate_registration(
    email: &str,
    password_hash: &str,
) -> Result<(), EngramError> {
    if email.is_empty() {
        return Err(ValidationError::required_field("email").into());
    }
    if email.chars().any(char::is_whitespace) || email.matches('@').count() != 1 {
        return Err(ValidationError::invalid_field("email", "not a plausible address").into());
    }
    if password_hash.is_empty() {
        return Err(ValidationError::required_field("password_hash").into());
    }
    Ok(())
}
