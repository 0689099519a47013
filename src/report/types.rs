//! Weekly report document types.
//!
//! [`WeeklyReportData`] is the structured blob persisted per
//! `(user, week_key)`; cache hits return the stored JSON byte-for-byte, so
//! every field here must serialize deterministically.

use serde::{Deserialize, Serialize};

/// A keyword and how often it appeared across the week's notes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeywordCount {
    /// Keyword name.
    pub name: String,

    /// Occurrence count across the week's note↔keyword links.
    pub count: usize,
}

/// Summary of one semantic cluster of the week's notes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Dense cluster id, 0-based.
    pub cluster_id: usize,

    /// Number of notes in the cluster.
    pub size: usize,

    /// First 100 characters of the cluster's earliest-created note.
    pub representative_sentence: String,

    /// Three most frequent keyword names within the cluster.
    pub top_keywords: Vec<String>,

    /// Member note ids, ordered by creation time.
    pub note_ids: Vec<String>,
}

/// A suggested connection between two notes of the week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PotentialConnection {
    /// One endpoint note id.
    pub from_note_id: String,

    /// The other endpoint note id.
    pub to_note_id: String,

    /// Embedding cosine similarity of the pair.
    pub similarity_score: f32,

    /// Human-readable justification.
    pub reason: String,
}

/// The full weekly report document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReportData {
    /// ISO week key, `YYYY-WNN`.
    pub week_key: String,

    /// Number of notes that entered the analysis.
    pub total_notes: usize,

    /// Semantic clusters.
    pub clusters: Vec<ClusterSummary>,

    /// Top 10 keywords across the week, count descending.
    pub top_keywords: Vec<KeywordCount>,

    /// Keywords absent from the previous ISO week, at most 5.
    pub new_keywords: Vec<String>,

    /// Up to 5 high-similarity note pairs.
    pub potential_connections: Vec<PotentialConnection>,

    /// Generation instant, RFC 3339.
    pub generated_at: String,
}

/// Weekly report response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeeklyReportResponse {
    /// ISO week key, `YYYY-WNN`.
    pub week_key: String,

    /// The report document.
    pub report: WeeklyReportData,

    /// Generation time in milliseconds; 0 for cache hits.
    pub processing_time_ms: u64,
}
