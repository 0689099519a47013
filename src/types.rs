//! Core type definitions for Engram identifiers and timestamps.
//!
//! Entity identifiers are client-assigned opaque strings: devices mint ids
//! offline and the server treats them as globally unique keys. Server-created
//! rows (users) use UUID v7 for time-ordered identification.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User identifier.
///
/// Users are created server-side during registration and receive a UUID v7
/// id. The core otherwise treats the value as an opaque string, so external
/// auth systems may supply their own ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a UserId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh UserId with a UUID v7 (time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the user id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Note identifier (client-assigned opaque string).
///
/// Offline clients assign note ids locally, so the server never generates
/// them; uniqueness is a client contract enforced by upsert semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub String);

impl NoteId {
    /// Creates a NoteId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the note id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relation identifier (client-assigned opaque string).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationId(pub String);

impl RelationId {
    /// Creates a RelationId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the relation id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device identifier supplied by sync clients.
///
/// Devices identify themselves on every push/pull. The core logs the value
/// for observability but does not key any state on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Creates a DeviceId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the device id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds.
///
/// Millisecond precision is what the sync protocol needs: checkpoints are
/// RFC 3339 strings with sub-second precision, and per-row monotonicity is
/// enforced by bumping at least one millisecond past the stored value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch (should never happen
    /// in practice), returns a timestamp of 0 (epoch) rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns big-endian bytes for storage (enables lexicographic ordering).
    #[inline]
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// The Unix epoch (all-zeros timestamp).
    #[inline]
    pub const fn epoch() -> Self {
        Self(0)
    }

    /// Parses an RFC 3339 / ISO 8601 datetime string.
    ///
    /// Accepts any offset; the stored value is normalized to UTC millis.
    /// Returns `None` on malformed input.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc).timestamp_millis()))
    }

    /// Formats as an RFC 3339 UTC string with millisecond precision.
    ///
    /// This is the wire form used for checkpoints and entity timestamps.
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Converts to a `chrono` UTC datetime (for calendar arithmetic).
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Creates a timestamp from a `chrono` UTC datetime.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedding vector type alias.
///
/// Embeddings are f32 vectors of the dimension configured at database
/// creation (default 1024).
pub type Embedding = Vec<f32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_generate_is_unique() {
        let id1 = UserId::generate();
        let id2 = UserId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_user_id_display() {
        let id = UserId::new("user-123");
        assert_eq!(id.as_str(), "user-123");
        assert_eq!(format!("{}", id), "user-123");
    }

    #[test]
    fn test_note_id_roundtrip() {
        let id = NoteId::new("note-abc");
        let bytes = bincode::serialize(&id).unwrap();
        let restored: NoteId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_timestamp_now() {
        let t1 = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let t2 = Timestamp::now();
        assert!(t1 < t2, "Timestamps should be ordered");
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1 < t2);
    }

    #[test]
    fn test_timestamp_be_bytes() {
        // Big-endian ensures lexicographic ordering matches numeric ordering
        let t1 = Timestamp::from_millis(100);
        let t2 = Timestamp::from_millis(200);
        assert!(t1.to_be_bytes() < t2.to_be_bytes());
    }

    #[test]
    fn test_timestamp_rfc3339_roundtrip() {
        let t = Timestamp::from_millis(1_735_732_800_123);
        let s = t.to_rfc3339();
        let parsed = Timestamp::parse_rfc3339(&s).unwrap();
        assert_eq!(t, parsed);
    }

    #[test]
    fn test_timestamp_parse_accepts_offsets() {
        let utc = Timestamp::parse_rfc3339("2025-01-10T10:00:00Z").unwrap();
        let offset = Timestamp::parse_rfc3339("2025-01-10T19:00:00+09:00").unwrap();
        assert_eq!(utc, offset);
    }

    #[test]
    fn test_timestamp_parse_rejects_garbage() {
        assert!(Timestamp::parse_rfc3339("not-a-date").is_none());
        assert!(Timestamp::parse_rfc3339("2025-13-40T99:00:00Z").is_none());
    }

    #[test]
    fn test_timestamp_epoch_formats() {
        assert_eq!(Timestamp::epoch().to_rfc3339(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_device_id() {
        let id = DeviceId::new("device-7");
        assert_eq!(id.as_str(), "device-7");
    }
}
