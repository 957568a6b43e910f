// ============================================
// Book Recommendation - Service Layer
// ============================================
//
// Channels:
//   1. Collaborative filtering (item-item cosine over reader ratings)
//   2. Semantic seed (nearest stored vectors to a seed book)
//   3. Semantic query (filtered vector + lexical hybrid over free text)
//
// Architecture:
//   RecommendRequest → HybridRecommender ─┬─ ItemSimilarityEngine
//                                          ├─ SemanticChannel (seed, query)
//                                          └─ normalize → fuse → hydrate → explain

pub mod collaborative_filtering;
pub mod explanation;
pub mod hybrid_ranker;
pub mod search;
pub mod semantic;

pub use collaborative_filtering::{cosine_similarity, ItemSimilarityEngine, ItemUserMatrix};
pub use explanation::{explain, FALLBACK_EXPLANATION};
pub use hybrid_ranker::{blend_semantic, fuse, FusedCandidate, HybridRecommender};
pub use search::BookSearchService;
pub use semantic::{hybrid_score, QueryHit, SemanticChannel};

use crate::error::{RecommendationError, Result};

/// Reject weights that are not finite or fall outside `[0, 1]`.
pub fn validate_unit_weight(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RecommendationError::Validation(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
