//! Embedding service abstractions for Engram.
//!
//! This module provides the trait and implementations for embedding
//! generation. Embeddings are dense vector representations of note text
//! used for recommendations and weekly-report clustering.
//!
//! Every provider applies the same [`preprocess`] step before encoding:
//! whitespace runs collapse to single spaces, URLs become a sentinel token,
//! text is truncated to the model character budget, and very short memos
//! get a fixed disambiguating prefix.
//!
//! The bundled provider is [`HashingEmbedder`](hashing::HashingEmbedder), a
//! deterministic character-trigram feature hasher. Neural models plug in
//! behind the same trait.

pub mod hashing;

pub use hashing::HashingEmbedder;

use crate::config::Config;
use crate::error::{EngramError, Result};
use crate::types::Embedding;

/// Character budget applied during preprocessing.
///
/// Twice the reference model's 512-token window, the conservative
/// chars-per-token estimate for mixed Korean/English text.
pub const MAX_INPUT_CHARS: usize = 1024;

/// Inputs shorter than this (after preprocessing) get [`SHORT_MEMO_PREFIX`].
pub const SHORT_INPUT_CHARS: usize = 10;

/// Fixed prefix that disambiguates very short memos for the encoder.
pub const SHORT_MEMO_PREFIX: &str = "short memo: ";

/// Sentinel that replaces URLs so link noise doesn't dominate the vector.
pub const URL_SENTINEL: &str = "[URL]";

/// Embedding service trait for generating vector representations of text.
///
/// Implementations must be thread-safe (`Send + Sync`): the service is a
/// process-wide singleton invoked from concurrent push handlers. They must
/// also be deterministic on identical inputs within one process, which the
/// derivation pipeline relies on for idempotent re-derivation.
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns `EngramError::Embedding` if the input is empty after
    /// preprocessing or encoding fails. Callers in the sync path recover by
    /// storing a null embedding.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Returns the dimension of embeddings produced by this service.
    fn dimension(&self) -> usize;

    /// Validates that an embedding has the correct dimension.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DimensionMismatch` if dimensions don't match.
    fn validate_embedding(&self, embedding: &Embedding) -> Result<()> {
        let expected = self.dimension();
        let actual = embedding.len();

        if actual != expected {
            return Err(EngramError::Validation(
                crate::error::ValidationError::dimension_mismatch(expected, actual),
            ));
        }

        Ok(())
    }
}

/// Normalizes raw note text into encoder input.
///
/// - Whitespace runs collapse to single spaces (trimmed at both ends)
/// - Tokens that look like URLs become [`URL_SENTINEL`]
/// - The result is truncated to [`MAX_INPUT_CHARS`] characters
/// - Non-empty inputs shorter than [`SHORT_INPUT_CHARS`] characters get
///   [`SHORT_MEMO_PREFIX`]
///
/// Returns an empty string when nothing significant remains; providers
/// treat that as an error and the derivation pipeline degrades to a null
/// embedding.
pub fn preprocess(body: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for token in body.split_whitespace() {
        if token.starts_with("http://") || token.starts_with("https://") {
            tokens.push(URL_SENTINEL);
        } else {
            tokens.push(token);
        }
    }
    let mut text: String = tokens.join(" ");

    if text.chars().count() > MAX_INPUT_CHARS {
        text = text.chars().take(MAX_INPUT_CHARS).collect();
    }

    if text.is_empty() {
        return text;
    }

    if text.chars().count() < SHORT_INPUT_CHARS {
        return format!("{SHORT_MEMO_PREFIX}{text}");
    }

    text
}

/// Creates the embedding service for the given configuration.
///
/// The bundled deterministic hasher is dimension-agnostic, so the
/// configured dimension is the only parameter.
pub fn create_embedding_service(config: &Config) -> Result<Box<dyn EmbeddingService>> {
    Ok(Box::new(HashingEmbedder::new(config.embedding_dimension)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_collapses_whitespace() {
        assert_eq!(
            preprocess("hello   world\n\nnext  line"),
            "hello world next line"
        );
    }

    #[test]
    fn test_preprocess_replaces_urls() {
        let out = preprocess("see https://example.com/a?b=c for details");
        assert_eq!(out, "see [URL] for details");

        let out = preprocess("plain http://x.io end");
        assert_eq!(out, "plain [URL] end");
    }

    #[test]
    fn test_preprocess_truncates() {
        let long = "a".repeat(5000);
        let out = preprocess(&long);
        assert_eq!(out.chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn test_preprocess_prefixes_short_memos() {
        assert_eq!(preprocess("todo"), "short memo: todo");
        // 10 significant chars: no prefix
        assert_eq!(preprocess("0123456789"), "0123456789");
    }

    #[test]
    fn test_preprocess_empty_stays_empty() {
        assert_eq!(preprocess(""), "");
        assert_eq!(preprocess("   \n\t  "), "");
    }

    #[test]
    fn test_create_embedding_service_uses_configured_dimension() {
        let config = Config {
            embedding_dimension: 256,
            ..Default::default()
        };
        let service = create_embedding_service(&config).unwrap();
        assert_eq!(service.dimension(), 256);
    }

    #[test]
    fn test_validate_embedding() {
        let service = HashingEmbedder::new(4);
        assert!(service.validate_embedding(&vec![0.0; 4]).is_ok());
        assert!(service.validate_embedding(&vec![0.0; 3]).is_err());
    }
}
