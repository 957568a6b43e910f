//! Direct semantic lookups: free-text search and nearest books by embedding.

use super::semantic::SemanticChannel;
use crate::config::RecommendationSettings;
use crate::error::{RecommendationError, Result};
use crate::models::{Book, BookId, BookSummary, Channel, QueryFilters, SearchHit, SimilarBook};
use crate::stores::{BookStore, EmbeddingProvider, RatingStore, VectorSimilarityIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SNIPPET_CHARS: usize = 200;

/// Single-line description preview, cut at 200 characters.
pub fn snippet(description: Option<&str>) -> Option<String> {
    let text = description?.trim().replace('\n', " ");
    if text.is_empty() {
        return None;
    }
    if text.chars().count() > SNIPPET_CHARS {
        let cut: String = text.chars().take(SNIPPET_CHARS).collect();
        Some(format!("{}…", cut))
    } else {
        Some(text)
    }
}

#[derive(Clone)]
pub struct BookSearchService {
    semantic: SemanticChannel,
    books: Arc<dyn BookStore>,
    settings: RecommendationSettings,
}

impl BookSearchService {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        books: Arc<dyn BookStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorSimilarityIndex>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            semantic: SemanticChannel::new(embedder, index, ratings),
            books,
            settings,
        }
    }

    /// Filtered hybrid search over the catalog, best hybrid score first.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        hybrid_weight: f64,
        filters: &QueryFilters,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RecommendationError::Validation(
                "Query 'q' is required".to_string(),
            ));
        }
        self.check_k(k)?;

        let hits = self
            .semantic
            .query_hits(query, k, hybrid_weight, filters)
            .await?;
        let ids: Vec<BookId> = hits.iter().map(|hit| hit.book_id).collect();
        let mut books = self.load_books(&ids).await?;

        let results: Vec<SearchHit> = hits
            .into_iter()
            .filter_map(|hit| {
                books.remove(&hit.book_id).map(|book| SearchHit {
                    snippet: snippet(book.description.as_deref()),
                    book,
                    cosine: hit.vscore,
                    lexical: hit.tscore,
                    score: hit.score,
                })
            })
            .collect();

        info!(query, returned = results.len(), "Semantic search served");
        Ok(results)
    }

    /// Books closest to `book_id` in embedding space.
    pub async fn similar_books(&self, book_id: BookId, k: usize) -> Result<Vec<SimilarBook>> {
        self.check_k(k)?;

        let neighbours = self
            .semantic
            .neighbours_of(book_id, k)
            .await?
            .ok_or_else(|| {
                RecommendationError::NotFound(format!("No embedding found for book {}", book_id))
            })?;

        let ids: Vec<BookId> = neighbours.iter().map(|(id, _)| *id).collect();
        let mut books = self.load_books(&ids).await?;

        Ok(neighbours
            .into_iter()
            .filter_map(|(id, cosine)| books.remove(&id).map(|book| SimilarBook { book, cosine }))
            .collect())
    }

    /// Catalog listing: books whose title contains `q` (case-insensitive),
    /// or the first `limit` books when `q` is absent or blank.
    pub async fn list_books(&self, q: Option<&str>, limit: usize) -> Result<Vec<BookSummary>> {
        self.check_k(limit)?;

        let title_contains = q.map(str::trim).filter(|q| !q.is_empty()).map(str::to_string);
        let books = self
            .books
            .list(title_contains.clone(), limit)
            .await
            .map_err(|e| RecommendationError::upstream_for(Channel::Catalog, "book listing", e))?;

        debug!(q = ?title_contains, returned = books.len(), "Catalog listed");
        Ok(books.into_iter().map(BookSummary::from).collect())
    }

    fn check_k(&self, k: usize) -> Result<()> {
        if k == 0 || k > self.settings.max_k {
            return Err(RecommendationError::Validation(format!(
                "k must be within 1..={}, got {}",
                self.settings.max_k, k
            )));
        }
        Ok(())
    }

    async fn load_books(&self, ids: &[BookId]) -> Result<HashMap<BookId, Book>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let books = self
            .books
            .fetch_many(ids)
            .await
            .map_err(|e| RecommendationError::upstream(Channel::Catalog, e))?;
        if books.len() < ids.len() {
            warn!(
                requested = ids.len(),
                found = books.len(),
                "Some indexed books are missing from the catalog"
            );
        }
        Ok(books)
    }
}
