use crate::error::{RecommendationError, Result};
use crate::models::HybridWeights;
use crate::utils::pool_size;
use serde::Deserialize;

/// Environment variable prefix for every setting, e.g. `BOOKREC_EMBED_DIM`.
pub const ENV_PREFIX: &str = "BOOKREC_";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub service: ServiceConfig,
    pub embedding: EmbeddingConfig,
    pub recommendation: RecommendationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Deployment-wide vector dimension; every stored vector must match.
    #[serde(default = "default_embed_dim")]
    pub embed_dim: usize,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    #[serde(default = "default_max_description_chars")]
    pub max_description_chars: usize,
}

/// Defaults and limits applied to recommendation requests.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationSettings {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_max_k")]
    pub max_k: usize,
    /// Minimum number of shared raters for two books to be compared.
    #[serde(default = "default_min_overlap")]
    pub min_overlap: usize,
    #[serde(default = "default_w_cf")]
    pub w_cf: f64,
    #[serde(default = "default_w_semantic")]
    pub w_semantic: f64,
    #[serde(default = "default_w_sub_channel")]
    pub w_seed: f64,
    #[serde(default = "default_w_sub_channel")]
    pub w_query: f64,
    #[serde(default = "default_hybrid_weight")]
    pub hybrid_weight: f64,
    #[serde(default = "default_cf_pool_multiplier")]
    pub cf_pool_multiplier: usize,
    #[serde(default = "default_cf_pool_floor")]
    pub cf_pool_floor: usize,
    #[serde(default = "default_semantic_pool_floor")]
    pub semantic_pool_floor: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            catalog_path: default_catalog_path(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            embed_model: default_embed_model(),
            embed_dim: default_embed_dim(),
            embed_batch_size: default_embed_batch_size(),
            max_description_chars: default_max_description_chars(),
        }
    }
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            max_k: default_max_k(),
            min_overlap: default_min_overlap(),
            w_cf: default_w_cf(),
            w_semantic: default_w_semantic(),
            w_seed: default_w_sub_channel(),
            w_query: default_w_sub_channel(),
            hybrid_weight: default_hybrid_weight(),
            cf_pool_multiplier: default_cf_pool_multiplier(),
            cf_pool_floor: default_cf_pool_floor(),
            semantic_pool_floor: default_semantic_pool_floor(),
        }
    }
}

impl RecommendationSettings {
    pub fn default_weights(&self) -> HybridWeights {
        HybridWeights {
            cf: self.w_cf,
            semantic: self.w_semantic,
            seed: self.w_seed,
            query: self.w_query,
        }
    }

    /// How many CF candidates to pull before fusion.
    pub fn cf_pool(&self, k: usize) -> usize {
        pool_size(k, self.cf_pool_multiplier, self.cf_pool_floor)
    }

    /// How many candidates each semantic sub-channel pulls before fusion.
    pub fn semantic_pool(&self, k: usize) -> usize {
        pool_size(k, self.cf_pool_multiplier, self.semantic_pool_floor)
    }
}

impl Config {
    /// Load `.env` (if present) and then `BOOKREC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            service: envy::prefixed(ENV_PREFIX).from_env::<ServiceConfig>()?,
            embedding: envy::prefixed(ENV_PREFIX).from_env::<EmbeddingConfig>()?,
            recommendation: envy::prefixed(ENV_PREFIX).from_env::<RecommendationSettings>()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.embed_dim == 0 {
            return Err(RecommendationError::Config(
                "EMBED_DIM must be positive".to_string(),
            ));
        }
        if self.embedding.embed_batch_size == 0 {
            return Err(RecommendationError::Config(
                "EMBED_BATCH_SIZE must be positive".to_string(),
            ));
        }
        if !matches!(self.service.log_format.as_str(), "text" | "json") {
            return Err(RecommendationError::Config(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.service.log_format
            )));
        }

        let rec = &self.recommendation;
        if rec.max_k == 0 || rec.default_k == 0 || rec.default_k > rec.max_k {
            return Err(RecommendationError::Config(format!(
                "DEFAULT_K must be within 1..={} (got {})",
                rec.max_k, rec.default_k
            )));
        }
        for (name, value) in [
            ("W_CF", rec.w_cf),
            ("W_SEMANTIC", rec.w_semantic),
            ("W_SEED", rec.w_seed),
            ("W_QUERY", rec.w_query),
            ("HYBRID_WEIGHT", rec.hybrid_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RecommendationError::Config(format!(
                    "{} must be within [0, 1] (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "book-recommendation-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_catalog_path() -> String {
    "./data/catalog.json".to_string()
}

fn default_embed_model() -> String {
    "feature-hash-v1".to_string()
}

fn default_embed_dim() -> usize {
    384
}

fn default_embed_batch_size() -> usize {
    256
}

fn default_max_description_chars() -> usize {
    4000
}

fn default_k() -> usize {
    20
}

fn default_max_k() -> usize {
    100
}

fn default_min_overlap() -> usize {
    2
}

fn default_w_cf() -> f64 {
    0.0
}

fn default_w_semantic() -> f64 {
    1.0
}

fn default_w_sub_channel() -> f64 {
    0.5
}

fn default_hybrid_weight() -> f64 {
    0.7
}

fn default_cf_pool_multiplier() -> usize {
    3
}

fn default_cf_pool_floor() -> usize {
    50
}

fn default_semantic_pool_floor() -> usize {
    100
}
