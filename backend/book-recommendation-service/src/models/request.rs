use super::{Book, BookId, ChannelScores, UserId};
use serde::{Deserialize, Serialize};

/// Attribute predicates applied to query-channel candidates before ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Exact language code; an empty string disables the filter.
    #[serde(default)]
    pub lang: Option<String>,
    /// Books with an unknown fiction flag never pass this filter.
    #[serde(default)]
    pub fiction: Option<bool>,
    /// Books with an unknown year pass.
    #[serde(default)]
    pub min_year: Option<i32>,
    /// Books with an unknown page count pass.
    #[serde(default)]
    pub max_pages: Option<i32>,
    #[serde(default)]
    pub exclude_rated_user_id: Option<UserId>,
}

impl QueryFilters {
    pub fn language(&self) -> Option<&str> {
        self.lang.as_deref().filter(|code| !code.is_empty())
    }
}

/// Channel weights. `cf`/`semantic` blend the top-level channels,
/// `seed`/`query` blend the two semantic sub-channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub cf: f64,
    pub semantic: f64,
    pub seed: f64,
    pub query: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            cf: 0.0,
            semantic: 1.0,
            seed: 0.5,
            query: 0.5,
        }
    }
}

/// Input of [`HybridRecommender::recommend`](crate::services::HybridRecommender::recommend).
///
/// Unset numeric fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub seed_book_id: Option<BookId>,
    #[serde(default, alias = "q")]
    pub query: Option<String>,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub w_cf: Option<f64>,
    #[serde(default)]
    pub w_semantic: Option<f64>,
    #[serde(default)]
    pub w_seed: Option<f64>,
    #[serde(default)]
    pub w_query: Option<f64>,
    #[serde(default)]
    pub hybrid_weight: Option<f64>,
    #[serde(default, flatten)]
    pub filters: QueryFilters,
}

impl RecommendRequest {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(UserId(user_id)),
            ..Self::default()
        }
    }

    pub fn for_seed(book_id: i64) -> Self {
        Self {
            seed_book_id: Some(BookId(book_id)),
            ..Self::default()
        }
    }

    pub fn for_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(UserId(user_id));
        self
    }

    pub fn with_seed(mut self, book_id: i64) -> Self {
        self.seed_book_id = Some(BookId(book_id));
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_weights(mut self, weights: HybridWeights) -> Self {
        self.w_cf = Some(weights.cf);
        self.w_semantic = Some(weights.semantic);
        self.w_seed = Some(weights.seed);
        self.w_query = Some(weights.query);
        self
    }

    pub fn with_hybrid_weight(mut self, hybrid_weight: f64) -> Self {
        self.hybrid_weight = Some(hybrid_weight);
        self
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub book: Book,
    pub score: f64,
    pub channels: ChannelScores,
    pub explanation: String,
}

/// Per-request candidate counts, for logging and alerting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecommendStats {
    pub cf_candidates: usize,
    pub seed_candidates: usize,
    pub query_candidates: usize,
    pub fused_candidates: usize,
    /// Ranked ids the book store could not resolve.
    pub hydration_misses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResponse {
    pub query: Option<String>,
    pub seed_book_id: Option<BookId>,
    pub user_id: Option<UserId>,
    pub k: usize,
    pub weights: HybridWeights,
    pub hybrid_weight: f64,
    pub results: Vec<RecommendationResult>,
    pub stats: RecommendStats,
}

/// One hydrated semantic search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub book: Book,
    pub cosine: f64,
    pub lexical: f64,
    pub score: f64,
    pub snippet: Option<String>,
}

/// Catalog listing row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSummary {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
}

impl From<Book> for BookSummary {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarBook {
    pub book: Book,
    pub cosine: f64,
}
