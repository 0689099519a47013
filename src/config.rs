//! Configuration types for Engram.
//!
//! The [`Config`] struct controls engine behavior including:
//! - Embedding dimension
//! - Sync batch and paging caps
//! - Recommendation weights and thresholds
//! - Weekly-report clustering parameters
//!
//! # Example
//! ```rust
//! use engram::Config;
//!
//! // Use defaults (1024-dimensional embeddings, batch cap 100)
//! let config = Config::default();
//!
//! // Customize for a smaller embedding model
//! let config = Config {
//!     embedding_dimension: 384,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Engine configuration options.
///
/// All fields have the documented platform defaults. Use struct update
/// syntax to override specific settings:
///
/// ```rust
/// use engram::Config;
///
/// let config = Config {
///     pull_page_size: 50,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Embedding vector dimension (must match the embedding provider).
    ///
    /// Locked on database creation; reopening with a different value fails.
    /// Default: 1024
    pub embedding_dimension: usize,

    /// Maximum number of changes accepted in one push batch.
    ///
    /// Exceeding this rejects the whole envelope before any item is applied.
    /// Default: 100
    pub max_batch_items: usize,

    /// Maximum JSON-encoded byte size of one push batch.
    ///
    /// Default: 1 MiB
    pub max_batch_bytes: usize,

    /// Per-entity-type page cap for pull responses.
    ///
    /// Default: 100
    pub pull_page_size: usize,

    /// Number of keywords derived per note.
    ///
    /// Default: 5
    pub keyword_top_k: usize,

    /// Recommendation scoring parameters.
    pub recommendation: RecommendationConfig,

    /// Weekly-report clustering parameters.
    pub clustering: ClusteringConfig,

    /// Access-token lifetime handed to the auth boundary hosting this core.
    ///
    /// The engine itself never mints tokens; the value is exposed here so
    /// the host reads one validated configuration source.
    /// Default: 60
    pub access_token_expire_minutes: u64,

    /// HNSW vector index parameters.
    ///
    /// Controls the quality and performance of neighbor retrieval.
    /// See [`HnswConfig`] for tuning guidelines.
    pub hnsw: HnswConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // 1024 matches multilingual-e5-large, the reference model
            embedding_dimension: 1024,
            max_batch_items: 100,
            max_batch_bytes: 1_048_576,
            pull_page_size: 100,
            keyword_top_k: 5,
            recommendation: RecommendationConfig::default(),
            clustering: ClusteringConfig::default(),
            access_token_expire_minutes: 60,
            hnsw: HnswConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a Config from `ENGRAM_*` process-environment variables.
    ///
    /// Unset variables keep their defaults; set-but-unparsable values are
    /// rejected. Recognized variables:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `ENGRAM_EMBEDDING_DIM` | `embedding_dimension` |
    /// | `ENGRAM_SYNC_BATCH_MAX_SIZE` | `max_batch_items` |
    /// | `ENGRAM_SYNC_BATCH_MAX_BYTES` | `max_batch_bytes` |
    /// | `ENGRAM_PULL_PAGE_SIZE` | `pull_page_size` |
    /// | `ENGRAM_KEYWORD_TOP_K` | `keyword_top_k` |
    /// | `ENGRAM_RECOMMEND_TOP_K` | `recommendation.default_k` |
    /// | `ENGRAM_RECOMMEND_MIN_SCORE` | `recommendation.min_score` |
    /// | `ENGRAM_RECOMMEND_MAX_CANDIDATES` | `recommendation.max_candidates` |
    /// | `ENGRAM_WEIGHT_EMBEDDING` | `recommendation.embedding_weight` |
    /// | `ENGRAM_WEIGHT_KEYWORD` | `recommendation.keyword_weight` |
    /// | `ENGRAM_WEIGHT_TEMPORAL` | `recommendation.temporal_weight` |
    /// | `ENGRAM_CLUSTER_SEED` | `clustering.seed` |
    /// | `ENGRAM_CLUSTER_RESTARTS` | `clustering.restarts` |
    /// | `ENGRAM_ACCESS_TOKEN_EXPIRE_MINUTES` | `access_token_expire_minutes` |
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();

        read_env("ENGRAM_EMBEDDING_DIM", &mut config.embedding_dimension)?;
        read_env("ENGRAM_SYNC_BATCH_MAX_SIZE", &mut config.max_batch_items)?;
        read_env("ENGRAM_SYNC_BATCH_MAX_BYTES", &mut config.max_batch_bytes)?;
        read_env("ENGRAM_PULL_PAGE_SIZE", &mut config.pull_page_size)?;
        read_env("ENGRAM_KEYWORD_TOP_K", &mut config.keyword_top_k)?;
        read_env("ENGRAM_RECOMMEND_TOP_K", &mut config.recommendation.default_k)?;
        read_env(
            "ENGRAM_RECOMMEND_MIN_SCORE",
            &mut config.recommendation.min_score,
        )?;
        read_env(
            "ENGRAM_RECOMMEND_MAX_CANDIDATES",
            &mut config.recommendation.max_candidates,
        )?;
        read_env(
            "ENGRAM_WEIGHT_EMBEDDING",
            &mut config.recommendation.embedding_weight,
        )?;
        read_env(
            "ENGRAM_WEIGHT_KEYWORD",
            &mut config.recommendation.keyword_weight,
        )?;
        read_env(
            "ENGRAM_WEIGHT_TEMPORAL",
            &mut config.recommendation.temporal_weight,
        )?;
        read_env("ENGRAM_CLUSTER_SEED", &mut config.clustering.seed)?;
        read_env("ENGRAM_CLUSTER_RESTARTS", &mut config.clustering.restarts)?;
        read_env(
            "ENGRAM_ACCESS_TOKEN_EXPIRE_MINUTES",
            &mut config.access_token_expire_minutes,
        )?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `Engram::open()`. You can also call this
    /// explicitly to check configuration before attempting to open.
    ///
    /// # Errors
    /// Returns `ValidationError` if any cap is zero, the embedding dimension
    /// is out of `1..=4096`, or scoring parameters are outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.embedding_dimension == 0 || self.embedding_dimension > 4096 {
            return Err(ValidationError::invalid_field(
                "embedding_dimension",
                "must be between 1 and 4096",
            ));
        }

        if self.max_batch_items == 0 {
            return Err(ValidationError::invalid_field(
                "max_batch_items",
                "must be greater than 0",
            ));
        }
        if self.max_batch_bytes == 0 {
            return Err(ValidationError::invalid_field(
                "max_batch_bytes",
                "must be greater than 0",
            ));
        }
        if self.pull_page_size == 0 {
            return Err(ValidationError::invalid_field(
                "pull_page_size",
                "must be greater than 0",
            ));
        }
        if self.keyword_top_k == 0 {
            return Err(ValidationError::invalid_field(
                "keyword_top_k",
                "must be greater than 0",
            ));
        }
        if self.access_token_expire_minutes == 0 {
            return Err(ValidationError::invalid_field(
                "access_token_expire_minutes",
                "must be greater than 0",
            ));
        }

        self.recommendation.validate()?;
        self.clustering.validate()?;

        if self.hnsw.max_nb_connection == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.max_nb_connection",
                "must be greater than 0",
            ));
        }
        if self.hnsw.ef_construction == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_construction",
                "must be greater than 0",
            ));
        }
        if self.hnsw.ef_search == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_search",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Reads one environment variable into `target` if it is set.
fn read_env<T: std::str::FromStr>(
    name: &str,
    target: &mut T,
) -> Result<(), ValidationError> {
    match std::env::var(name) {
        Ok(raw) => {
            *target = raw
                .parse()
                .map_err(|_| ValidationError::invalid_field(name, format!("unparsable value '{raw}'")))?;
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

/// Scoring parameters for the recommendation engine.
///
/// The final score is a weighted combination of embedding cosine
/// similarity, keyword Jaccard overlap, and temporal proximity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Weight of embedding cosine similarity. Default: 0.6
    pub embedding_weight: f32,

    /// Weight of keyword Jaccard similarity. Default: 0.3
    pub keyword_weight: f32,

    /// Weight of temporal proximity. Default: 0.1
    pub temporal_weight: f32,

    /// Candidates scoring below this are discarded. Default: 0.3
    pub min_score: f32,

    /// Result count when the caller does not specify `k`. Default: 10
    pub default_k: usize,

    /// Neighbor candidates retrieved from the vector index. Default: 50
    pub max_candidates: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            embedding_weight: 0.6,
            keyword_weight: 0.3,
            temporal_weight: 0.1,
            min_score: 0.3,
            default_k: 10,
            max_candidates: 50,
        }
    }
}

impl RecommendationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("recommendation.embedding_weight", self.embedding_weight),
            ("recommendation.keyword_weight", self.keyword_weight),
            ("recommendation.temporal_weight", self.temporal_weight),
            ("recommendation.min_score", self.min_score),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(ValidationError::invalid_field(
                    name,
                    format!("must be between 0.0 and 1.0, got {}", value),
                ));
            }
        }

        let weight_sum = self.embedding_weight + self.keyword_weight + self.temporal_weight;
        if weight_sum <= 0.0 {
            return Err(ValidationError::invalid_field(
                "recommendation",
                "weights must not all be zero",
            ));
        }

        if !(1..=50).contains(&self.default_k) {
            return Err(ValidationError::invalid_field(
                "recommendation.default_k",
                "must be between 1 and 50",
            ));
        }
        if self.max_candidates == 0 {
            return Err(ValidationError::invalid_field(
                "recommendation.max_candidates",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Clustering parameters for the weekly report engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Seed for k-means initialization. Default: 42
    pub seed: u64,

    /// Number of k-means restarts; the lowest-inertia run wins. Default: 10
    pub restarts: usize,

    /// Upper bound on the cluster count. Default: 5
    pub max_clusters: usize,

    /// Cosine similarity threshold for suggested connections. Default: 0.7
    pub connection_threshold: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            restarts: 10,
            max_clusters: 5,
            connection_threshold: 0.7,
        }
    }
}

impl ClusteringConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.restarts == 0 {
            return Err(ValidationError::invalid_field(
                "clustering.restarts",
                "must be greater than 0",
            ));
        }
        if self.max_clusters == 0 {
            return Err(ValidationError::invalid_field(
                "clustering.max_clusters",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.connection_threshold) {
            return Err(ValidationError::invalid_field(
                "clustering.connection_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

/// Configuration for the HNSW vector index.
///
/// Controls the trade-off between index build time, memory usage,
/// and search accuracy. The defaults are tuned for per-user note
/// collections (hundreds to tens of thousands of notes).
///
/// # Tuning Guide
///
/// | Use Case     | M  | ef_construction | ef_search |
/// |--------------|----|-----------------|-----------|
/// | Low memory   |  8 |             100 |        30 |
/// | Balanced     | 16 |             200 |        50 |
/// | High recall  | 32 |             400 |       100 |
#[derive(Clone, Debug)]
pub struct HnswConfig {
    /// Maximum bidirectional connections per node (M parameter).
    ///
    /// Higher values improve recall but increase memory and build time.
    /// Each node stores up to M links, so memory per node is O(M).
    /// Default: 16
    pub max_nb_connection: usize,

    /// Number of candidates tracked during index construction.
    ///
    /// Higher values produce a better quality graph but slow down insertion.
    /// Rule of thumb: ef_construction >= 2 * max_nb_connection.
    /// Default: 200
    pub ef_construction: usize,

    /// Number of candidates tracked during search.
    ///
    /// Higher values improve recall but increase search latency.
    /// Must be >= k (the number of results requested).
    /// Default: 100
    pub ef_search: usize,

    /// Maximum number of layers in the skip-list structure.
    ///
    /// Default 16 handles per-user collections far beyond realistic sizes.
    pub max_layer: usize,

    /// Initial pre-allocated capacity (number of vectors).
    ///
    /// The index grows beyond this automatically, but pre-allocation
    /// avoids reallocations for known workloads.
    /// Default: 10_000
    pub max_elements: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_nb_connection: 16,
            ef_construction: 200,
            ef_search: 100,
            max_layer: 16,
            max_elements: 10_000,
        }
    }
}
