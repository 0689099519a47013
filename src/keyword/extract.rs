//! Heuristic keyword extraction.
//!
//! Approximates morphological analysis deterministically:
//!
//! 1. Tokenize on script boundaries (Latin/digit runs, Hangul runs, Han
//!    runs; everything else separates).
//! 2. Normalize Hangul tokens by stripping trailing particles
//!    (longest-match against the common particle list).
//! 3. Keep only permitted categories: common and proper nouns, verbs,
//!    adjectives, foreign (Latin) tokens, and Han tokens.
//! 4. Filter stop words and the `[2, 20]`-character length bounds; drop
//!    purely numeric tokens.
//! 5. Score by normalized term frequency × a length/capitalization-biased
//!    inverse-document-frequency heuristic.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::KeywordService;

/// Minimum keyword length in characters.
const MIN_KEYWORD_LENGTH: usize = 2;

/// Maximum keyword length in characters.
const MAX_KEYWORD_LENGTH: usize = 20;

/// Korean particles stripped from the tail of Hangul tokens,
/// longest first so compound particles win over their prefixes.
const PARTICLES: &[&str] = &[
    "에서", "으로", "까지", "부터", "처럼", "같이", "이", "가", "을", "를", "은", "는",
    "의", "에", "로", "과", "와", "도", "만",
];

/// Verb endings checked after particle stripping.
const VERB_ENDINGS: &[&str] = &["하다", "되다", "지다"];

/// Adjective endings checked before the generic verb rule.
const ADJECTIVE_ENDINGS: &[&str] = &["스럽다", "롭다"];

/// Morphological category of a token.
///
/// Only these categories survive filtering; symbol and numeric runs never
/// reach scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenCategory {
    /// Hangul token with no verb/adjective ending.
    CommonNoun,
    /// Capitalized Latin token.
    ProperNoun,
    /// Hangul token with a verb ending.
    Verb,
    /// Hangul token with an adjective ending.
    Adjective,
    /// Lowercase Latin token (foreign word in the Korean tagset sense).
    Foreign,
    /// Han-character token.
    Han,
}

/// Script class used by the tokenizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Script {
    Latin,
    Hangul,
    Han,
    Other,
}

fn script_of(c: char) -> Script {
    if c.is_ascii_alphanumeric() {
        Script::Latin
    } else if ('\u{AC00}'..='\u{D7A3}').contains(&c) || ('\u{1100}'..='\u{11FF}').contains(&c) {
        Script::Hangul
    } else if ('\u{4E00}'..='\u{9FFF}').contains(&c) || ('\u{3400}'..='\u{4DBF}').contains(&c) {
        Script::Han
    } else {
        Script::Other
    }
}

/// Deterministic keyword extractor.
///
/// Construction loads the built-in stop-word set; afterwards the extractor
/// is immutable and freely shared across threads.
#[derive(Debug)]
pub struct HeuristicExtractor {
    stopwords: HashSet<&'static str>,
}

impl HeuristicExtractor {
    /// Creates an extractor with the built-in stop-word set.
    pub fn new() -> Self {
        Self {
            stopwords: Self::load_stopwords(),
        }
    }

    /// Built-in stop words: Korean particles, auxiliaries, pronouns, and
    /// degree adverbs, plus common English function words.
    fn load_stopwords() -> HashSet<&'static str> {
        let korean = [
            // Particles (also stripped by normalization, listed for
            // standalone occurrences)
            "이", "가", "을", "를", "은", "는", "의", "에", "에서", "로", "으로",
            "과", "와", "도", "만", "까지", "부터", "처럼", "같이",
            // Auxiliary verbs/adjectives
            "하다", "되다", "있다", "없다", "이다", "아니다",
            // Pronouns
            "나", "너", "우리", "저희", "그", "그녀", "이것", "그것", "저것",
            // Adverbs
            "매우", "정말", "너무", "아주", "조금", "많이", "좀",
            // Common verbs
            "보다", "가다", "오다", "주다", "받다", "말하다",
            // Numbers
            "하나", "둘", "셋", "첫", "두", "세",
        ];

        let english = [
            "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
            "of", "with", "by", "from", "as", "is", "was", "are", "were", "be",
            "been", "being", "have", "has", "had", "do", "does", "did", "will",
            "would", "could", "should", "may", "might", "can", "this", "that",
            "these", "those", "i", "you", "he", "she", "it", "we", "they",
        ];

        korean.into_iter().chain(english).collect()
    }

    /// Splits text into same-script character runs.
    fn tokenize(text: &str) -> Vec<(String, Script)> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut current_script = Script::Other;

        for c in text.chars() {
            let script = script_of(c);
            if script == current_script && script != Script::Other {
                current.push(c);
                continue;
            }
            if !current.is_empty() && current_script != Script::Other {
                tokens.push((std::mem::take(&mut current), current_script));
            }
            current.clear();
            current_script = script;
            if script != Script::Other {
                current.push(c);
            }
        }
        if !current.is_empty() && current_script != Script::Other {
            tokens.push((current, current_script));
        }

        tokens
    }

    /// Strips one trailing particle from a Hangul token (longest match).
    fn strip_particle(token: &str) -> &str {
        for particle in PARTICLES {
            if let Some(stem) = token.strip_suffix(particle) {
                if !stem.is_empty() {
                    return stem;
                }
            }
        }
        token
    }

    /// Normalizes a token and classifies it, or drops it (`None`).
    fn classify(token: &str, script: Script) -> Option<(String, TokenCategory)> {
        match script {
            Script::Latin => {
                // Purely numeric runs carry no topical signal
                if token.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let category = if token.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                {
                    TokenCategory::ProperNoun
                } else {
                    TokenCategory::Foreign
                };
                Some((token.to_owned(), category))
            }
            Script::Hangul => {
                let stem = Self::strip_particle(token);
                let category = if ADJECTIVE_ENDINGS.iter().any(|e| stem.ends_with(e)) {
                    TokenCategory::Adjective
                } else if VERB_ENDINGS.iter().any(|e| stem.ends_with(e)) {
                    TokenCategory::Verb
                } else {
                    TokenCategory::CommonNoun
                };
                Some((stem.to_owned(), category))
            }
            Script::Han => Some((token.to_owned(), TokenCategory::Han)),
            Script::Other => None,
        }
    }

    /// Length bounds and stop-word filtering on the normalized token.
    fn is_valid(&self, word: &str) -> bool {
        let len = word.chars().count();
        if !(MIN_KEYWORD_LENGTH..=MAX_KEYWORD_LENGTH).contains(&len) {
            return false;
        }
        if self.stopwords.contains(word.to_lowercase().as_str()) {
            return false;
        }
        true
    }

    /// IDF heuristic: longer words are more specific, proper nouns more so.
    fn idf(word: &str, category: TokenCategory) -> f32 {
        let base = (word.chars().count() as f32 / 5.0).min(2.0);
        if category == TokenCategory::ProperNoun {
            base + 0.5
        } else {
            base
        }
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordService for HeuristicExtractor {
    fn extract(&self, text: &str, top_k: usize) -> Vec<(String, f32)> {
        if text.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut counts: HashMap<String, (u32, TokenCategory)> = HashMap::new();
        for (token, script) in Self::tokenize(text) {
            let Some((word, category)) = Self::classify(&token, script) else {
                continue;
            };
            if !self.is_valid(&word) {
                continue;
            }
            counts.entry(word).or_insert((0, category)).0 += 1;
        }

        if counts.is_empty() {
            debug!("No valid keywords after filtering");
            return Vec::new();
        }

        let max_count = counts.values().map(|(count, _)| *count).max().unwrap_or(1) as f32;

        let mut scored: Vec<(String, f32)> = counts
            .into_iter()
            .map(|(word, (count, category))| {
                let tf = count as f32 / max_count;
                let score = tf * Self::idf(&word, category);
                (word, score)
            })
            .collect();

        // Score descending, name ascending on ties for full determinism
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        debug!(count = scored.len(), "Extracted keywords");
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HeuristicExtractor {
        HeuristicExtractor::new()
    }

    #[test]
    fn test_extract_english_keywords() {
        let names: Vec<String> = extractor()
            .extract("learning about database storage and database indexing", 5)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert!(names.contains(&"database".to_string()));
        assert!(names.contains(&"storage".to_string()));
        // Function words never surface
        assert!(!names.contains(&"and".to_string()));
        assert!(!names.contains(&"about".to_string()));
    }

    #[test]
    fn test_repeated_term_ranks_first() {
        let result = extractor().extract("database database database storage", 5);
        assert_eq!(result[0].0, "database");
        assert!(result[0].1 >= result[1].1);
    }

    #[test]
    fn test_proper_noun_bonus() {
        // Same frequency and length; capitalization should break the tie
        let result = extractor().extract("Tokyo winter", 5);
        let tokyo = result.iter().find(|(n, _)| n == "Tokyo").unwrap();
        let winter = result.iter().find(|(n, _)| n == "winter").unwrap();
        assert!(tokyo.1 > winter.1);
    }

    #[test]
    fn test_korean_particle_stripping() {
        let names = extractor().extract_names("데이터베이스를 공부했다", 5);
        assert!(names.contains(&"데이터베이스".to_string()));
    }

    #[test]
    fn test_korean_stopwords_filtered() {
        let names = extractor().extract_names("정말 매우 많이", 5);
        assert!(names.is_empty());
    }

    #[test]
    fn test_length_bounds() {
        // Single characters and over-long runs are dropped
        let names = extractor().extract_names("x yz", 5);
        assert_eq!(names, vec!["yz".to_string()]);

        let long = "a".repeat(30);
        assert!(extractor().extract_names(&long, 5).is_empty());
    }

    #[test]
    fn test_numeric_tokens_dropped() {
        let names = extractor().extract_names("12345 67890 meeting", 5);
        assert_eq!(names, vec!["meeting".to_string()]);
    }

    #[test]
    fn test_punctuation_separates_tokens() {
        let names = extractor().extract_names("storage,indexing;caching", 5);
        assert!(names.contains(&"storage".to_string()));
        assert!(names.contains(&"indexing".to_string()));
        assert!(names.contains(&"caching".to_string()));
    }

    #[test]
    fn test_top_k_limits_output() {
        let result = extractor().extract(
            "alpha beta gamma delta epsilon zeta eta theta",
            3,
        );
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_deterministic_on_equal_input() {
        let text = "notes about storage engines and vector indexes";
        let a = extractor().extract(text, 5);
        let b = extractor().extract(text, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input() {
        assert!(extractor().extract("", 5).is_empty());
        assert!(extractor().extract("   ", 5).is_empty());
    }

    #[test]
    fn test_classification_categories() {
        let classify = |token: &str, script: Script| {
            HeuristicExtractor::classify(token, script).map(|(_, c)| c)
        };

        assert_eq!(
            classify("Tokyo", Script::Latin),
            Some(TokenCategory::ProperNoun)
        );
        assert_eq!(
            classify("storage", Script::Latin),
            Some(TokenCategory::Foreign)
        );
        assert_eq!(classify("12345", Script::Latin), None);
        assert_eq!(
            classify("메모리", Script::Hangul),
            Some(TokenCategory::CommonNoun)
        );
        assert_eq!(
            classify("공부하다", Script::Hangul),
            Some(TokenCategory::Verb)
        );
        assert_eq!(
            classify("자연스럽다", Script::Hangul),
            Some(TokenCategory::Adjective)
        );
        assert_eq!(classify("漢字", Script::Han), Some(TokenCategory::Han));
    }

    #[test]
    fn test_mixed_script_text() {
        let names = extractor().extract_names("Rust로 메모리 안전성 공부", 5);
        assert!(names.contains(&"Rust".to_string()));
        assert!(names.contains(&"메모리".to_string()));
    }
}
