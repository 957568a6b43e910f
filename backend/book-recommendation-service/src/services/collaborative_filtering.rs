// ============================================
// Item-Item Collaborative Filtering
// ============================================
//
// Builds a sparse book -> {reader: rating} matrix from the full rating set
// and scores candidates by rater-overlap cosine similarity.
//
// Data Flow:
//   RatingStore (all triples) → ItemUserMatrix → similar items / per-reader scores
//
// Every call recomputes from scratch: O(items²) per request, no index.

use crate::error::{RecommendationError, Result};
use crate::models::{BookId, Channel, RatingTriple, ScoreMap, UserId};
use crate::stores::RatingStore;
use crate::utils::rank_descending;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Ratings of one book, keyed by reader.
pub type RaterVector = BTreeMap<UserId, f64>;

/// Cosine similarity between two rater vectors.
///
/// The dot product runs over co-raters only, while each norm runs over the
/// vector's full set of ratings. This is not textbook cosine; rankings depend
/// on it, so keep it as is. Returns `0.0` for disjoint raters or zero norms.
pub fn cosine_similarity(a: &RaterVector, b: &RaterVector) -> f64 {
    let (overlap, dot) = co_rated(a, b);
    if overlap == 0 {
        return 0.0;
    }

    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Number of shared raters and the dot product over them.
fn co_rated(a: &RaterVector, b: &RaterVector) -> (usize, f64) {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(user, x)| large.get(user).map(|y| x * y))
        .fold((0, 0.0), |(n, dot), product| (n + 1, dot + product))
}

fn overlap(a: &RaterVector, b: &RaterVector) -> usize {
    co_rated(a, b).0
}

/// Sparse rating matrix, indexed both by book and by reader.
///
/// Ordered maps keep floating-point summation order, and therefore scores,
/// identical across runs.
#[derive(Debug, Clone, Default)]
pub struct ItemUserMatrix {
    by_item: BTreeMap<BookId, RaterVector>,
    by_user: HashMap<UserId, BTreeMap<BookId, f64>>,
}

impl ItemUserMatrix {
    pub fn from_ratings(ratings: impl IntoIterator<Item = RatingTriple>) -> Self {
        let mut matrix = Self::default();
        for t in ratings {
            matrix
                .by_item
                .entry(t.book_id)
                .or_default()
                .insert(t.user_id, t.rating);
            matrix
                .by_user
                .entry(t.user_id)
                .or_default()
                .insert(t.book_id, t.rating);
        }
        matrix
    }

    pub fn item_count(&self) -> usize {
        self.by_item.len()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    pub fn raters(&self, book_id: BookId) -> Option<&RaterVector> {
        self.by_item.get(&book_id)
    }

    /// Books most similar to `book_id` by rating pattern.
    ///
    /// Only books sharing at least `min_overlap` raters with the target are
    /// scored. The target itself is never returned.
    pub fn similar_items(
        &self,
        book_id: BookId,
        k: usize,
        min_overlap: usize,
    ) -> Vec<(BookId, f64)> {
        let target = match self.by_item.get(&book_id) {
            Some(target) if !target.is_empty() => target,
            _ => return Vec::new(),
        };

        let mut sims: Vec<(BookId, f64)> = self
            .by_item
            .iter()
            .filter(|(other_id, _)| **other_id != book_id)
            .filter(|(_, other)| overlap(target, other) >= min_overlap)
            .map(|(other_id, other)| (*other_id, cosine_similarity(target, other)))
            .collect();

        rank_descending(&mut sims);
        sims.truncate(k);
        sims
    }

    /// Per-reader recommendations.
    ///
    /// Formula: score[c] = Σ sim(i, c) × rating(user, i) over the reader's
    /// rated books `i`, counting only pairs with `overlap >= min_overlap` and
    /// `sim > 0`. Books the reader already rated are never candidates.
    pub fn recommend_for_user(
        &self,
        user_id: UserId,
        k: usize,
        min_overlap: usize,
    ) -> Vec<(BookId, f64)> {
        let rated = match self.by_user.get(&user_id) {
            Some(rated) if !rated.is_empty() => rated,
            _ => return Vec::new(),
        };

        let mut scores: BTreeMap<BookId, f64> = BTreeMap::new();
        for (rated_id, rating) in rated {
            let Some(target) = self.by_item.get(rated_id) else {
                continue;
            };

            for (candidate_id, candidate) in &self.by_item {
                if rated.contains_key(candidate_id) {
                    continue;
                }
                if overlap(target, candidate) < min_overlap {
                    continue;
                }
                let sim = cosine_similarity(target, candidate);
                if sim <= 0.0 {
                    continue;
                }
                *scores.entry(*candidate_id).or_insert(0.0) += sim * rating;
            }
        }

        let mut ranked: Vec<(BookId, f64)> = scores.into_iter().collect();
        rank_descending(&mut ranked);
        ranked.truncate(k);
        ranked
    }

    /// CF channel for the hybrid ranker: reader recommendations and seed
    /// neighbours merged by taking the per-book maximum.
    pub fn channel_scores(
        &self,
        user_id: Option<UserId>,
        seed_book_id: Option<BookId>,
        pool: usize,
        min_overlap: usize,
    ) -> ScoreMap {
        let mut merged = ScoreMap::new();
        if let Some(user_id) = user_id {
            for (book_id, score) in self.recommend_for_user(user_id, pool, min_overlap) {
                merged.merge_max(book_id, score);
            }
        }
        if let Some(seed_book_id) = seed_book_id {
            for (book_id, score) in self.similar_items(seed_book_id, pool, min_overlap) {
                merged.merge_max(book_id, score);
            }
        }
        merged
    }
}

/// Collaborative-filtering channel over the rating store.
#[derive(Clone)]
pub struct ItemSimilarityEngine {
    ratings: Arc<dyn RatingStore>,
}

impl ItemSimilarityEngine {
    pub fn new(ratings: Arc<dyn RatingStore>) -> Self {
        Self { ratings }
    }

    /// Pull every rating and build the matrix for this request.
    pub async fn load_matrix(&self) -> Result<ItemUserMatrix> {
        let triples = self
            .ratings
            .all_ratings()
            .await
            .map_err(|e| RecommendationError::upstream(Channel::Collaborative, e))?;

        let matrix = ItemUserMatrix::from_ratings(triples);
        debug!(
            items = matrix.item_count(),
            users = matrix.user_count(),
            "Rating matrix built"
        );
        Ok(matrix)
    }

    pub async fn similar_items_by_ratings(
        &self,
        book_id: BookId,
        k: usize,
        min_overlap: usize,
    ) -> Result<Vec<(BookId, f64)>> {
        let matrix = self.load_matrix().await?;
        let similar = matrix.similar_items(book_id, k, min_overlap);

        info!(
            book_id = %book_id,
            candidates = similar.len(),
            "Item-based CF neighbours computed"
        );
        Ok(similar)
    }

    pub async fn recommend_for_user(
        &self,
        user_id: UserId,
        k: usize,
        min_overlap: usize,
    ) -> Result<Vec<(BookId, f64)>> {
        let matrix = self.load_matrix().await?;
        let recommendations = matrix.recommend_for_user(user_id, k, min_overlap);

        info!(
            user_id = %user_id,
            candidates = recommendations.len(),
            "Reader CF recommendations generated"
        );
        Ok(recommendations)
    }
}
