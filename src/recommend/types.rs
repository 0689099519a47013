//! Result types for the recommendation engine.

use serde::{Deserialize, Serialize};

use crate::sync::types::ts_rfc3339;
use crate::types::Timestamp;

/// One recommended note with its score and justification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendedNote {
    /// Candidate note id.
    pub note_id: String,

    /// First 100 characters of the candidate body.
    pub body_preview: String,

    /// Hybrid score in `[0, 1]`.
    pub score: f32,

    /// Human-readable justification clauses joined by ` | `.
    pub reason: String,

    /// Candidate creation time.
    #[serde(with = "ts_rfc3339")]
    pub created_at: Timestamp,

    /// Keywords shared with the target, in the target's ranking order.
    pub common_keywords: Vec<String>,
}

/// Recommendation response for one target note.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationResult {
    /// Target note id.
    pub note_id: String,

    /// Top-k recommendations sorted by score descending.
    pub recommendations: Vec<RecommendedNote>,

    /// Candidate count before the score threshold was applied.
    pub total_candidates: usize,

    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes() {
        let result = RecommendationResult {
            note_id: "n1".to_string(),
            recommendations: vec![RecommendedNote {
                note_id: "n2".to_string(),
                body_preview: "preview".to_string(),
                score: 0.73,
                reason: "similar context".to_string(),
                created_at: Timestamp::from_millis(0),
                common_keywords: vec!["ml".to_string()],
            }],
            total_candidates: 5,
            processing_time_ms: 3,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["recommendations"][0]["note_id"], "n2");
        assert_eq!(json["total_candidates"], 5);
    }
}
