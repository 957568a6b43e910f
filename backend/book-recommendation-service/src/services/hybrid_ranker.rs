// ============================================
// Hybrid Recommender
// ============================================
//
// Fuses the collaborative and semantic channels into one ranked list.
//
// Formula:
//   sem_combined[b] = w_seed × seed_norm[b] + w_query × query_norm[b]
//   final[b]        = w_cf × cf_norm[b] + w_semantic × sem_combined[b]
//
// Each raw channel is min-max normalized on its own range first; absent
// ids contribute 0. Ties on the final score resolve by ascending book id.

use super::collaborative_filtering::ItemSimilarityEngine;
use super::explanation::explain;
use super::semantic::SemanticChannel;
use super::validate_unit_weight;
use crate::config::RecommendationSettings;
use crate::error::{RecommendationError, Result};
use crate::models::{
    Book, BookId, Channel, ChannelScores, HybridWeights, QueryFilters, RecommendRequest,
    RecommendStats, RecommendationResponse, RecommendationResult, ScoreMap, UserId,
};
use crate::stores::{BookStore, EmbeddingProvider, RatingStore, VectorSimilarityIndex};
use crate::utils::{compare_ranked, min_max_normalize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A ranked candidate before hydration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedCandidate {
    pub book_id: BookId,
    pub score: f64,
    pub channels: ChannelScores,
}

/// Linear blend of the two normalized semantic sub-channels over the union
/// of their ids.
pub fn blend_semantic(
    seed_norm: &ScoreMap,
    query_norm: &ScoreMap,
    w_seed: f64,
    w_query: f64,
) -> ScoreMap {
    seed_norm
        .union_ids(query_norm)
        .into_iter()
        .map(|book_id| {
            (
                book_id,
                w_seed * seed_norm.get(book_id) + w_query * query_norm.get(book_id),
            )
        })
        .collect()
}

/// Final weighted sum over the union of CF and semantic ids, best first.
pub fn fuse(
    cf_norm: &ScoreMap,
    sem_combined: &ScoreMap,
    w_cf: f64,
    w_semantic: f64,
) -> Vec<FusedCandidate> {
    let mut fused: Vec<FusedCandidate> = cf_norm
        .union_ids(sem_combined)
        .into_iter()
        .map(|book_id| {
            let channels = ChannelScores {
                cf: cf_norm.get(book_id),
                semantic: sem_combined.get(book_id),
            };
            FusedCandidate {
                book_id,
                score: w_cf * channels.cf + w_semantic * channels.semantic,
                channels,
            }
        })
        .collect();

    fused.sort_by(|a, b| compare_ranked(&(a.book_id, a.score), &(b.book_id, b.score)));
    fused
}

/// Normalize the three raw channels and fuse them.
pub fn fuse_channels(
    cf_raw: &ScoreMap,
    seed_raw: &ScoreMap,
    query_raw: &ScoreMap,
    weights: &HybridWeights,
) -> Vec<FusedCandidate> {
    let cf_norm = min_max_normalize(cf_raw);
    let sem_combined = blend_semantic(
        &min_max_normalize(seed_raw),
        &min_max_normalize(query_raw),
        weights.seed,
        weights.query,
    );
    fuse(&cf_norm, &sem_combined, weights.cf, weights.semantic)
}

/// A request with defaults applied and every field validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub user_id: Option<UserId>,
    pub seed_book_id: Option<BookId>,
    pub query: Option<String>,
    pub k: usize,
    pub weights: HybridWeights,
    pub hybrid_weight: f64,
    pub filters: QueryFilters,
}

/// Multi-channel recommendation orchestrator.
#[derive(Clone)]
pub struct HybridRecommender {
    cf: ItemSimilarityEngine,
    semantic: SemanticChannel,
    books: Arc<dyn BookStore>,
    settings: RecommendationSettings,
}

impl HybridRecommender {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        books: Arc<dyn BookStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorSimilarityIndex>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            cf: ItemSimilarityEngine::new(ratings.clone()),
            semantic: SemanticChannel::new(embedder, index, ratings),
            books,
            settings,
        }
    }

    /// Apply configured defaults and validate the request.
    pub fn resolve(&self, request: RecommendRequest) -> Result<ResolvedRequest> {
        let query = request
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        if request.user_id.is_none() && request.seed_book_id.is_none() && query.is_none() {
            return Err(RecommendationError::Validation(
                "Provide at least one of query, seed_book_id, or user_id".to_string(),
            ));
        }

        let k = request.k.unwrap_or(self.settings.default_k);
        if k == 0 || k > self.settings.max_k {
            return Err(RecommendationError::Validation(format!(
                "k must be within 1..={}, got {}",
                self.settings.max_k, k
            )));
        }

        let defaults = self.settings.default_weights();
        let weights = HybridWeights {
            cf: request.w_cf.unwrap_or(defaults.cf),
            semantic: request.w_semantic.unwrap_or(defaults.semantic),
            seed: request.w_seed.unwrap_or(defaults.seed),
            query: request.w_query.unwrap_or(defaults.query),
        };
        let hybrid_weight = request
            .hybrid_weight
            .unwrap_or(self.settings.hybrid_weight);

        validate_unit_weight("w_cf", weights.cf)?;
        validate_unit_weight("w_semantic", weights.semantic)?;
        validate_unit_weight("w_seed", weights.seed)?;
        validate_unit_weight("w_query", weights.query)?;
        validate_unit_weight("hybrid_weight", hybrid_weight)?;

        if weights.seed + weights.query > 1.0 {
            warn!(
                w_seed = weights.seed,
                w_query = weights.query,
                "Semantic sub-channel weights sum above 1; scores may exceed w_cf + w_semantic"
            );
        }

        Ok(ResolvedRequest {
            user_id: request.user_id,
            seed_book_id: request.seed_book_id,
            query,
            k,
            weights,
            hybrid_weight,
            filters: request.filters,
        })
    }

    /// Rank books for the request and attach an explanation to each result.
    #[instrument(skip(self, request), fields(user_id = ?request.user_id, seed_book_id = ?request.seed_book_id))]
    pub async fn recommend(&self, request: RecommendRequest) -> Result<RecommendationResponse> {
        let resolved = self.resolve(request)?;

        let seed_book = match resolved.seed_book_id {
            Some(seed_book_id) => Some(self.resolve_seed(seed_book_id).await?),
            None => None,
        };

        let cf_pool = self.settings.cf_pool(resolved.k);
        let semantic_pool = self.settings.semantic_pool(resolved.k);

        let (cf_raw, seed_raw, query_raw) = tokio::try_join!(
            self.collaborative_scores(&resolved, cf_pool),
            self.seed_scores(&resolved, semantic_pool),
            self.query_scores(&resolved, semantic_pool),
        )?;

        let fused = fuse_channels(&cf_raw, &seed_raw, &query_raw, &resolved.weights);
        let mut stats = RecommendStats {
            cf_candidates: cf_raw.len(),
            seed_candidates: seed_raw.len(),
            query_candidates: query_raw.len(),
            fused_candidates: fused.len(),
            hydration_misses: 0,
        };

        let top: Vec<FusedCandidate> = fused.into_iter().take(resolved.k).collect();
        let (results, misses) = self.hydrate(&top, seed_book.as_ref()).await?;
        stats.hydration_misses = misses;

        info!(
            k = resolved.k,
            cf_candidates = stats.cf_candidates,
            seed_candidates = stats.seed_candidates,
            query_candidates = stats.query_candidates,
            fused_candidates = stats.fused_candidates,
            returned = results.len(),
            "Recommendations generated"
        );

        Ok(RecommendationResponse {
            query: resolved.query,
            seed_book_id: resolved.seed_book_id,
            user_id: resolved.user_id,
            k: resolved.k,
            weights: resolved.weights,
            hybrid_weight: resolved.hybrid_weight,
            results,
            stats,
        })
    }

    /// Fail fast on a seed id the catalog does not know.
    async fn resolve_seed(&self, seed_book_id: BookId) -> Result<Book> {
        self.books
            .fetch(seed_book_id)
            .await
            .map_err(|e| {
                RecommendationError::upstream_for(
                    Channel::Catalog,
                    format!("seed book {}", seed_book_id),
                    e,
                )
            })?
            .ok_or_else(|| {
                RecommendationError::NotFound(format!("Seed book {} not found", seed_book_id))
            })
    }

    async fn collaborative_scores(&self, request: &ResolvedRequest, pool: usize) -> Result<ScoreMap> {
        if request.user_id.is_none() && request.seed_book_id.is_none() {
            return Ok(ScoreMap::new());
        }

        let matrix = self.cf.load_matrix().await?;
        let (user_id, seed_book_id) = (request.user_id, request.seed_book_id);
        let min_overlap = self.settings.min_overlap;

        let scores = tokio::task::spawn_blocking(move || {
            matrix.channel_scores(user_id, seed_book_id, pool, min_overlap)
        })
        .await?;

        debug!(candidates = scores.len(), "CF channel scored");
        Ok(scores)
    }

    async fn seed_scores(&self, request: &ResolvedRequest, pool: usize) -> Result<ScoreMap> {
        let Some(seed_book_id) = request.seed_book_id else {
            return Ok(ScoreMap::new());
        };

        let mut scores = ScoreMap::new();
        for (book_id, score) in self.semantic.seed_similarity(seed_book_id, pool).await? {
            scores.merge_max(book_id, score);
        }
        Ok(scores)
    }

    async fn query_scores(&self, request: &ResolvedRequest, pool: usize) -> Result<ScoreMap> {
        let Some(query) = request.query.as_deref() else {
            return Ok(ScoreMap::new());
        };

        let mut scores = ScoreMap::new();
        for (book_id, score) in self
            .semantic
            .query_hybrid(query, pool, request.hybrid_weight, &request.filters)
            .await?
        {
            scores.merge_max(book_id, score);
        }
        Ok(scores)
    }

    /// Load ranked books in order. Ids the store cannot resolve are dropped
    /// and counted.
    async fn hydrate(
        &self,
        ranked: &[FusedCandidate],
        base: Option<&Book>,
    ) -> Result<(Vec<RecommendationResult>, usize)> {
        if ranked.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let ids: Vec<BookId> = ranked.iter().map(|c| c.book_id).collect();
        let mut books = self
            .books
            .fetch_many(&ids)
            .await
            .map_err(|e| {
                RecommendationError::upstream_for(
                    Channel::Catalog,
                    format!("hydration of {} ids", ids.len()),
                    e,
                )
            })?;

        let mut results = Vec::with_capacity(ranked.len());
        let mut misses = Vec::new();
        for candidate in ranked {
            match books.remove(&candidate.book_id) {
                Some(book) => {
                    let explanation = explain(base, &book, &candidate.channels);
                    results.push(RecommendationResult {
                        book,
                        score: candidate.score,
                        channels: candidate.channels,
                        explanation,
                    });
                }
                None => misses.push(candidate.book_id),
            }
        }

        if !misses.is_empty() {
            warn!(
                missing = ?misses,
                "Ranked books missing from catalog; dropped from results"
            );
        }

        Ok((results, misses.len()))
    }
}
