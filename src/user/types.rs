//! Data types for user accounts.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};

/// A registered user.
///
/// The core never hard-deletes users; administrative deactivation flips
/// `is_active`. Password hashing happens at the auth boundary, so the core
/// only stores the opaque hash it is handed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned identifier (UUID v7).
    pub id: UserId,

    /// Login email; unique, compared case-exact.
    pub email: String,

    /// Opaque password hash produced by the auth boundary.
    pub password_hash: String,

    /// Whether the account may authenticate.
    pub is_active: bool,

    /// Registration time.
    pub created_at: Timestamp,
}

impl User {
    /// Creates a new active user with a fresh UUID v7 id.
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_active: true,
            created_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_active() {
        let user = User::new("a@example.com", "hash");
        assert!(user.is_active);
        assert_eq!(user.email, "a@example.com");
        assert!(!user.id.as_str().is_empty());
    }

    #[test]
    fn test_user_bincode_roundtrip() {
        let user = User::new("b@example.com", "hash2");
        let bytes = bincode::serialize(&user).unwrap();
        let restored: User = bincode::deserialize(&bytes).unwrap();
        assert_eq!(user.id, restored.id);
        assert_eq!(user.email, restored.email);
        assert_eq!(user.is_active, restored.is_active);
    }
}
