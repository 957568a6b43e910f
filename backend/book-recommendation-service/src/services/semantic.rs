// ============================================
// Semantic Channel
// ============================================
//
// Two sub-channels over the embedding space:
//   seed:  seed vector → k nearest stored vectors (cosine)
//   query: query text → filtered candidates → w·vscore + (1−w)·tscore
//
// Filters are applied before ranking, so the top-k always comes from the
// filtered set.

use super::validate_unit_weight;
use crate::error::{RecommendationError, Result};
use crate::models::{BookId, Channel, QueryFilters};
use crate::stores::{CandidateFilter, EmbeddingProvider, RatingStore, VectorSimilarityIndex};
use crate::utils::compare_ranked;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// One scored query-channel candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryHit {
    pub book_id: BookId,
    pub vscore: f64,
    pub tscore: f64,
    pub score: f64,
}

/// Blend vector and lexical relevance: `w·vscore + (1−w)·tscore`.
///
/// `hybrid_weight = 0` is purely lexical, `1` purely vector.
pub fn hybrid_score(hybrid_weight: f64, vscore: f64, tscore: f64) -> f64 {
    hybrid_weight * vscore + (1.0 - hybrid_weight) * tscore
}

fn seed_error(book_id: BookId, err: anyhow::Error) -> RecommendationError {
    RecommendationError::upstream_for(Channel::SemanticSeed, format!("seed book {}", book_id), err)
}

fn query_error(query_text: &str, err: anyhow::Error) -> RecommendationError {
    RecommendationError::upstream_for(Channel::SemanticQuery, format!("query {:?}", query_text), err)
}

#[derive(Clone)]
pub struct SemanticChannel {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorSimilarityIndex>,
    ratings: Arc<dyn RatingStore>,
}

impl SemanticChannel {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorSimilarityIndex>,
        ratings: Arc<dyn RatingStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            ratings,
        }
    }

    /// Nearest neighbours of the seed's stored vector, seed excluded.
    ///
    /// A seed without a stored vector contributes nothing.
    pub async fn seed_similarity(&self, seed_book_id: BookId, k: usize) -> Result<Vec<(BookId, f64)>> {
        let neighbours = self.neighbours_of(seed_book_id, k).await?;
        if neighbours.is_none() {
            debug!(book_id = %seed_book_id, "Seed book has no embedding");
        }
        Ok(neighbours.unwrap_or_default())
    }

    /// Like [`seed_similarity`](Self::seed_similarity), but `None` when the
    /// book has no stored vector.
    pub async fn neighbours_of(
        &self,
        book_id: BookId,
        k: usize,
    ) -> Result<Option<Vec<(BookId, f64)>>> {
        let vector = self
            .index
            .vector_for(book_id)
            .await
            .map_err(|e| seed_error(book_id, e))?;

        let Some(vector) = vector else {
            return Ok(None);
        };

        let neighbours: Vec<(BookId, f64)> = self
            .index
            .nearest(&vector, k, Some(book_id))
            .await
            .map_err(|e| seed_error(book_id, e))?
            .into_iter()
            .filter(|(id, _)| *id != book_id)
            .collect();

        info!(
            book_id = %book_id,
            candidates = neighbours.len(),
            "Seed similarity computed"
        );
        Ok(Some(neighbours))
    }

    /// Hybrid query scores as `(book_id, combined)` pairs, best first.
    pub async fn query_hybrid(
        &self,
        query_text: &str,
        k: usize,
        hybrid_weight: f64,
        filters: &QueryFilters,
    ) -> Result<Vec<(BookId, f64)>> {
        Ok(self
            .query_hits(query_text, k, hybrid_weight, filters)
            .await?
            .into_iter()
            .map(|hit| (hit.book_id, hit.score))
            .collect())
    }

    /// Hybrid query scoring with the raw vector and lexical components kept.
    pub async fn query_hits(
        &self,
        query_text: &str,
        k: usize,
        hybrid_weight: f64,
        filters: &QueryFilters,
    ) -> Result<Vec<QueryHit>> {
        validate_unit_weight("hybrid_weight", hybrid_weight)?;

        let query_text = query_text.trim();
        if query_text.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .encode_query(query_text)
            .await
            .map_err(|e| query_error(query_text, e))?;
        if query_vector.is_empty() {
            return Ok(Vec::new());
        }

        let excluded = match filters.exclude_rated_user_id {
            Some(user_id) => self
                .ratings
                .rated_books(user_id)
                .await
                .map_err(|e| {
                    RecommendationError::upstream_for(
                        Channel::SemanticQuery,
                        format!("books rated by reader {}", user_id),
                        e,
                    )
                })?,
            None => HashSet::new(),
        };
        let filter = CandidateFilter::from_filters(filters, excluded);

        let candidates = self
            .index
            .score_candidates(&query_vector, query_text, &filter)
            .await
            .map_err(|e| query_error(query_text, e))?;

        let admitted = candidates.len();
        let mut hits: Vec<QueryHit> = candidates
            .into_iter()
            .map(|c| QueryHit {
                book_id: c.book_id,
                vscore: c.vscore,
                tscore: c.tscore,
                score: hybrid_score(hybrid_weight, c.vscore, c.tscore),
            })
            .collect();

        hits.sort_by(|a, b| compare_ranked(&(a.book_id, a.score), &(b.book_id, b.score)));
        hits.truncate(k);

        info!(
            admitted,
            returned = hits.len(),
            hybrid_weight,
            "Query channel scored"
        );
        Ok(hits)
    }
}
