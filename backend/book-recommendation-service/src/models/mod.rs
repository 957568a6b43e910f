mod request;
mod scores;

pub use request::{
    BookSummary, HybridWeights, QueryFilters, RecommendRequest, RecommendStats,
    RecommendationResponse, RecommendationResult, SearchHit, SimilarBook,
};
pub use scores::{Channel, ChannelScores, ScoreMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog identifier of a book.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BookId(pub i64);

/// Identifier of a reader who rated books.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_year: Option<i32>,
    #[serde(default)]
    pub isbn13: Option<String>,
    #[serde(default)]
    pub page_count: Option<i32>,
    /// Free text; enriched records end with a "Subjects: a | b | c" segment.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_fiction: Option<bool>,
}

impl Book {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: BookId(id),
            title: title.into(),
            author: None,
            published_year: None,
            isbn13: None,
            page_count: None,
            description: None,
            language_code: None,
            is_fiction: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    pub fn with_pages(mut self, pages: i32) -> Self {
        self.page_count = Some(pages);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }

    pub fn with_fiction(mut self, is_fiction: bool) -> Self {
        self.is_fiction = Some(is_fiction);
        self
    }
}

/// A stored rating row. `(user_id, book_id)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub book_id: BookId,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_rating_source")]
    pub source: String,
}

fn default_rating_source() -> String {
    "goodreads".to_string()
}

impl Rating {
    pub fn new(user_id: i64, book_id: i64, rating: f64) -> Self {
        Self {
            user_id: UserId(user_id),
            book_id: BookId(book_id),
            rating: Some(rating),
            rated_at: None,
            source: default_rating_source(),
        }
    }

    /// Rows without a numeric value carry no CF signal.
    pub fn triple(&self) -> Option<RatingTriple> {
        self.rating.map(|rating| RatingTriple {
            user_id: self.user_id,
            book_id: self.book_id,
            rating,
        })
    }
}

/// `(user, book, rating)` with a guaranteed value, as served by the rating store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingTriple {
    pub user_id: UserId,
    pub book_id: BookId,
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Book,
}

/// Dense vector keyed by `(entity_type, entity_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn book(book_id: BookId, vector: Vec<f32>) -> Self {
        Self {
            entity_type: EntityType::Book,
            entity_id: book_id.0,
            vector,
        }
    }
}
