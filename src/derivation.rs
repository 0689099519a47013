//! Derivation pipeline for accepted note writes.
//!
//! Every winning note insert/update runs through here before its storage
//! transaction: the body is embedded and its keyword set extracted, and the
//! results ride along into the same atomic write. Derivation failures are
//! absorbed — a note whose embedding cannot be generated is still a valid
//! note, it just stops participating in vector retrieval until its next
//! accepted write.

use tracing::warn;

use crate::embedding::EmbeddingService;
use crate::keyword::KeywordService;
use crate::types::Embedding;

/// Output of the derivation pipeline for one note body.
#[derive(Clone, Debug)]
pub struct NoteDerivation {
    /// Semantic embedding; `None` when generation failed.
    pub embedding: Option<Embedding>,

    /// Ranked `(name, score)` keywords; empty when nothing salient remains.
    pub keywords: Vec<(String, f32)>,
}

/// Runs embedding and keyword extraction for a note body.
///
/// Both services are deterministic on equal input, so re-deriving the same
/// body converges to the same embedding and keyword set even under client
/// retries.
pub(crate) fn derive_note(
    embedder: &dyn EmbeddingService,
    keywords: &dyn KeywordService,
    body: &str,
    top_k: usize,
) -> NoteDerivation {
    let embedding = match embedder.embed(body) {
        Ok(embedding) => Some(embedding),
        Err(e) => {
            warn!(error = %e, "Embedding generation failed; storing note without embedding");
            None
        }
    };

    let keywords = keywords.extract(body, top_k);

    NoteDerivation {
        embedding,
        keywords,
    }
}
