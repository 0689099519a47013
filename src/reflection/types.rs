//! Data types for daily reflections.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};

/// A per-day reflection.
///
/// Reflections are addressed by the composite key `(user_id, date)`: one
/// row per user per calendar day. Insert and update are the same upsert
/// operation under sync, resolved by last-writer-wins on `updated_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reflection {
    /// Owning user.
    pub user_id: UserId,

    /// Calendar day in `YYYY-MM-DD` form.
    pub date: String,

    /// Reflection text.
    pub content: String,

    /// Client-reported creation time.
    pub created_at: Timestamp,

    /// Client-reported modification time; the last-writer-wins pivot.
    pub updated_at: Timestamp,

    /// Server-assigned write time.
    pub server_timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflection_bincode_roundtrip() {
        let reflection = Reflection {
            user_id: UserId::new("u1"),
            date: "2025-01-10".to_string(),
            content: "Shipped the storage layer today".to_string(),
            created_at: Timestamp::from_millis(1000),
            updated_at: Timestamp::from_millis(2000),
            server_timestamp: Timestamp::from_millis(2500),
        };

        let bytes = bincode::serialize(&reflection).unwrap();
        let restored: Reflection = bincode::deserialize(&bytes).unwrap();

        assert_eq!(reflection.user_id, restored.user_id);
        assert_eq!(reflection.date, restored.date);
        assert_eq!(reflection.content, restored.content);
    }
}
