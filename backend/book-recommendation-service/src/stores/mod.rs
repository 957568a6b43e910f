//! Collaborator seams of the recommendation core.
//!
//! The core only reads through these traits. Failures come back as
//! `anyhow::Error` and are tagged with the originating channel by the caller.
mod hashing_embedder;
mod memory;
mod snapshot;

pub use hashing_embedder::HashingEmbedder;
pub use memory::{InMemoryBookStore, InMemoryRatingStore, InMemoryVectorIndex};
pub use snapshot::CatalogSnapshot;

use crate::models::{Book, BookId, Embedding, QueryFilters, RatingTriple, UserId};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

#[cfg(test)]
use mockall::automock;

/// Source of raw ratings.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Every `(user, book, rating)` triple with a non-null rating.
    async fn all_ratings(&self) -> Result<Vec<RatingTriple>>;

    /// Books the user has rated.
    async fn rated_books(&self, user_id: UserId) -> Result<HashSet<BookId>>;
}

/// Book attribute lookup. Unknown ids are omitted, never an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn fetch(&self, book_id: BookId) -> Result<Option<Book>>;

    async fn fetch_many(&self, book_ids: &[BookId]) -> Result<HashMap<BookId, Book>>;

    /// Up to `limit` books in ascending id order, restricted to titles
    /// containing `title_contains` (case-insensitive) when given.
    async fn list(&self, title_contains: Option<String>, limit: usize) -> Result<Vec<Book>>;
}

/// Text encoder shared by every request path.
///
/// Implementations are built once at startup and must be callable
/// concurrently through `&self`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encode documents; empty input yields empty output.
    async fn encode_docs(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Encode a query. Blank text yields an empty vector, meaning
    /// "no semantic signal".
    async fn encode_query(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Raw per-candidate scores returned by the vector index after filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub book_id: BookId,
    /// Cosine similarity to the query vector.
    pub vscore: f64,
    /// Lexical relevance of the query text against title + description.
    pub tscore: f64,
}

/// Attribute predicates resolved for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilter {
    pub language: Option<String>,
    pub fiction: Option<bool>,
    pub min_year: Option<i32>,
    pub max_pages: Option<i32>,
    /// Books removed outright (e.g. already rated by the requesting reader).
    pub excluded: HashSet<BookId>,
}

impl CandidateFilter {
    pub fn from_filters(filters: &QueryFilters, excluded: HashSet<BookId>) -> Self {
        Self {
            language: filters.language().map(str::to_string),
            fiction: filters.fiction,
            min_year: filters.min_year,
            max_pages: filters.max_pages,
            excluded,
        }
    }

    pub fn admits(&self, book: &Book) -> bool {
        if self.excluded.contains(&book.id) {
            return false;
        }
        if let Some(language) = &self.language {
            if book.language_code.as_deref() != Some(language.as_str()) {
                return false;
            }
        }
        if let Some(fiction) = self.fiction {
            if book.is_fiction != Some(fiction) {
                return false;
            }
        }
        if let (Some(min_year), Some(year)) = (self.min_year, book.published_year) {
            if year < min_year {
                return false;
            }
        }
        if let (Some(max_pages), Some(pages)) = (self.max_pages, book.page_count) {
            if pages > max_pages {
                return false;
            }
        }
        true
    }
}

/// Nearest-neighbour and lexical scoring over stored book vectors.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorSimilarityIndex: Send + Sync {
    async fn vector_for(&self, book_id: BookId) -> Result<Option<Vec<f32>>>;

    /// `k` nearest stored vectors by cosine similarity, skipping `exclude`.
    async fn nearest(
        &self,
        query: &[f32],
        k: usize,
        exclude: Option<BookId>,
    ) -> Result<Vec<(BookId, f64)>>;

    /// Raw vector and lexical scores for every candidate passing `filter`.
    async fn score_candidates(
        &self,
        query_vector: &[f32],
        query_text: &str,
        filter: &CandidateFilter,
    ) -> Result<Vec<CandidateScore>>;
}

/// A book paired with its freshly computed embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedBook {
    pub book: Book,
    pub embedding: Embedding,
}

/// Write side used by the embedding backfill job.
#[async_trait]
pub trait EmbeddingSink: Send + Sync {
    /// Insert or replace entries; returns how many were stored.
    async fn upsert_embeddings(&self, entries: Vec<IndexedBook>) -> Result<usize>;

    /// Length every stored vector must have.
    fn dimension(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Book {
        Book::new(1, "Solaris")
            .with_language("en")
            .with_fiction(true)
            .with_year(1961)
            .with_pages(204)
    }

    #[test]
    fn test_empty_filter_admits_everything() {
        assert!(CandidateFilter::default().admits(&book()));
    }

    #[test]
    fn test_filter_predicates() {
        let filter = CandidateFilter {
            language: Some("en".into()),
            fiction: Some(true),
            min_year: Some(1950),
            max_pages: Some(300),
            excluded: HashSet::new(),
        };
        assert!(filter.admits(&book()));

        let wrong_language = CandidateFilter {
            language: Some("pl".into()),
            ..CandidateFilter::default()
        };
        assert!(!wrong_language.admits(&book()));

        let too_old = CandidateFilter {
            min_year: Some(1970),
            ..CandidateFilter::default()
        };
        assert!(!too_old.admits(&book()));

        let too_long = CandidateFilter {
            max_pages: Some(100),
            ..CandidateFilter::default()
        };
        assert!(!too_long.admits(&book()));
    }

    #[test]
    fn test_unknown_attributes() {
        let bare = Book::new(2, "Untitled");

        let by_year = CandidateFilter {
            min_year: Some(2000),
            max_pages: Some(10),
            ..CandidateFilter::default()
        };
        assert!(by_year.admits(&bare));

        let by_fiction = CandidateFilter {
            fiction: Some(false),
            ..CandidateFilter::default()
        };
        assert!(!by_fiction.admits(&bare));
    }

    #[test]
    fn test_excluded_books() {
        let filter = CandidateFilter {
            excluded: [BookId(1)].into_iter().collect(),
            ..CandidateFilter::default()
        };
        assert!(!filter.admits(&book()));
    }
}
