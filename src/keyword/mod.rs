//! Keyword extraction abstractions for Engram.
//!
//! This module provides the trait and bundled implementation for deriving
//! ranked keyword tags from note text. Keywords feed the note↔keyword link
//! set, the recommendation engine's Jaccard overlap, and weekly-report
//! aggregation.
//!
//! The bundled [`HeuristicExtractor`] is a deterministic analyzer: a
//! script-aware tokenizer with particle stripping for Hangul, a built-in
//! stop-word set covering Korean function words and English function words,
//! and TF × heuristic-IDF scoring. A full morphological analyzer plugs in
//! behind the same trait.

mod extract;

pub use extract::HeuristicExtractor;

use crate::config::Config;
use crate::error::Result;

/// Keyword extraction service trait.
///
/// Implementations must be `Send + Sync` (the service is a process-wide
/// singleton shared by concurrent push handlers) and deterministic per
/// input: re-deriving the same body must yield the same keyword names so
/// the note↔keyword set converges under retries.
pub trait KeywordService: Send + Sync {
    /// Extracts up to `top_k` keywords from `text`.
    ///
    /// Returns `(name, score)` pairs sorted by score descending (name
    /// ascending on ties). An empty result is normal for texts with no
    /// salient terms; extraction never fails.
    fn extract(&self, text: &str, top_k: usize) -> Vec<(String, f32)>;

    /// Extracts keyword names only.
    fn extract_names(&self, text: &str, top_k: usize) -> Vec<String> {
        self.extract(text, top_k)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

/// Creates the keyword service for the given configuration.
pub fn create_keyword_service(_config: &Config) -> Result<Box<dyn KeywordService>> {
    Ok(Box::new(HeuristicExtractor::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_keyword_service() {
        let service = create_keyword_service(&Config::default()).unwrap();
        let names = service.extract_names("Rust storage engines with Rust", 5);
        assert!(names.iter().any(|n| n == "Rust"));
    }

    #[test]
    fn test_extract_names_drops_scores() {
        let service = HeuristicExtractor::new();
        let pairs = service.extract("database database storage", 5);
        let names = service.extract_names("database database storage", 5);
        assert_eq!(
            names,
            pairs.into_iter().map(|(n, _)| n).collect::<Vec<_>>()
        );
    }
}
