pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod stores;
pub mod utils;

pub use config::{Config, RecommendationSettings};
pub use error::{RecommendationError, Result};
pub use jobs::EmbeddingBackfillJob;
pub use services::{BookSearchService, HybridRecommender};
