use super::{
    BookStore, CandidateFilter, CandidateScore, EmbeddingSink, IndexedBook, RatingStore,
    VectorSimilarityIndex,
};
use crate::models::{Book, BookId, EntityType, Rating, RatingTriple, UserId};
use crate::utils::lexical::{lexical_relevance, term_frequencies};
use crate::utils::{dense_cosine, rank_descending};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Ratings held in memory, keyed by `(user, book)`.
pub struct InMemoryRatingStore {
    ratings: HashMap<(UserId, BookId), f64>,
}

impl InMemoryRatingStore {
    /// Rows without a value are dropped; a later row for the same
    /// `(user, book)` replaces the earlier one.
    pub fn new(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let ratings = ratings
            .into_iter()
            .filter_map(|rating| rating.triple())
            .map(|t| ((t.user_id, t.book_id), t.rating))
            .collect();
        Self { ratings }
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn all_ratings(&self) -> Result<Vec<RatingTriple>> {
        Ok(self
            .ratings
            .iter()
            .map(|(&(user_id, book_id), &rating)| RatingTriple {
                user_id,
                book_id,
                rating,
            })
            .collect())
    }

    async fn rated_books(&self, user_id: UserId) -> Result<HashSet<BookId>> {
        Ok(self
            .ratings
            .keys()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, book)| *book)
            .collect())
    }
}

pub struct InMemoryBookStore {
    books: HashMap<BookId, Book>,
}

impl InMemoryBookStore {
    pub fn new(books: impl IntoIterator<Item = Book>) -> Self {
        Self {
            books: books.into_iter().map(|book| (book.id, book)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn fetch(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.books.get(&book_id).cloned())
    }

    async fn fetch_many(&self, book_ids: &[BookId]) -> Result<HashMap<BookId, Book>> {
        Ok(book_ids
            .iter()
            .filter_map(|id| self.books.get(id).map(|book| (*id, book.clone())))
            .collect())
    }

    async fn list(&self, title_contains: Option<String>, limit: usize) -> Result<Vec<Book>> {
        let needle = title_contains.map(|q| q.to_lowercase());
        let mut matches: Vec<&Book> = self
            .books
            .values()
            .filter(|book| match &needle {
                Some(needle) => book.title.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .collect();

        matches.sort_by_key(|book| book.id);
        Ok(matches.into_iter().take(limit).cloned().collect())
    }
}

struct IndexEntry {
    book: Book,
    vector: Vec<f32>,
    terms: HashMap<String, usize>,
}

/// Brute-force vector index with attribute pre-filtering and lexical scoring.
///
/// Every stored vector must have the configured dimension.
pub struct InMemoryVectorIndex {
    dimension: usize,
    entries: RwLock<HashMap<BookId, IndexEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            bail!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            );
        }
        Ok(())
    }
}

fn lexical_document(book: &Book) -> HashMap<String, usize> {
    let text = format!(
        "{} {}",
        book.title,
        book.description.as_deref().unwrap_or("")
    );
    term_frequencies(&text)
}

#[async_trait]
impl VectorSimilarityIndex for InMemoryVectorIndex {
    async fn vector_for(&self, book_id: BookId) -> Result<Option<Vec<f32>>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&book_id)
            .map(|entry| entry.vector.clone()))
    }

    async fn nearest(
        &self,
        query: &[f32],
        k: usize,
        exclude: Option<BookId>,
    ) -> Result<Vec<(BookId, f64)>> {
        self.check_dimension(query)?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(BookId, f64)> = entries
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .filter_map(|(id, entry)| dense_cosine(query, &entry.vector).map(|sim| (*id, sim)))
            .collect();

        rank_descending(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }

    async fn score_candidates(
        &self,
        query_vector: &[f32],
        query_text: &str,
        filter: &CandidateFilter,
    ) -> Result<Vec<CandidateScore>> {
        self.check_dimension(query_vector)?;

        let entries = self.entries.read().await;
        let scored: Vec<CandidateScore> = entries
            .values()
            .filter(|entry| filter.admits(&entry.book))
            .filter_map(|entry| {
                dense_cosine(query_vector, &entry.vector).map(|vscore| CandidateScore {
                    book_id: entry.book.id,
                    vscore,
                    tscore: lexical_relevance(query_text, &entry.terms),
                })
            })
            .collect();

        debug!(
            indexed = entries.len(),
            admitted = scored.len(),
            "Scored query candidates"
        );

        Ok(scored)
    }
}

#[async_trait]
impl EmbeddingSink for InMemoryVectorIndex {
    async fn upsert_embeddings(&self, batch: Vec<IndexedBook>) -> Result<usize> {
        for item in &batch {
            if item.embedding.entity_type != EntityType::Book
                || item.embedding.entity_id != item.book.id.0
            {
                bail!(
                    "embedding key ({:?}, {}) does not belong to book {}",
                    item.embedding.entity_type,
                    item.embedding.entity_id,
                    item.book.id
                );
            }
            self.check_dimension(&item.embedding.vector)?;
        }

        let mut entries = self.entries.write().await;
        let stored = batch.len();
        for item in batch {
            let terms = lexical_document(&item.book);
            entries.insert(
                item.book.id,
                IndexEntry {
                    book: item.book,
                    vector: item.embedding.vector,
                    terms,
                },
            );
        }

        Ok(stored)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Embedding;

    fn indexed(book: Book, vector: Vec<f32>) -> IndexedBook {
        let embedding = Embedding::book(book.id, vector);
        IndexedBook { book, embedding }
    }

    #[test]
    fn test_rating_store_skips_null_ratings() {
        let mut unrated = Rating::new(1, 2, 0.0);
        unrated.rating = None;
        let store = InMemoryRatingStore::new(vec![Rating::new(1, 1, 4.0), unrated]);

        let ratings = tokio_test::block_on(store.all_ratings()).unwrap();
        assert_eq!(ratings.len(), 1);
        let rated = tokio_test::block_on(store.rated_books(UserId(1))).unwrap();
        assert_eq!(rated, [BookId(1)].into_iter().collect());
    }

    #[tokio::test]
    async fn test_fetch_many_omits_missing_books() {
        let store = InMemoryBookStore::new(vec![Book::new(1, "A"), Book::new(2, "B")]);
        let found = store
            .fetch_many(&[BookId(1), BookId(3)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&BookId(1)));
        assert!(store.fetch(BookId(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_titles_and_caps() {
        let store = InMemoryBookStore::new(vec![
            Book::new(3, "Dune Messiah"),
            Book::new(1, "Dune"),
            Book::new(2, "Solaris"),
            Book::new(4, "Children of Dune"),
        ]);

        let titles = |books: Vec<Book>| books.into_iter().map(|b| b.id.0).collect::<Vec<_>>();
        assert_eq!(titles(store.list(None, 2).await.unwrap()), vec![1, 2]);
        assert_eq!(
            titles(store.list(Some("DUNE".into()), 10).await.unwrap()),
            vec![1, 3, 4]
        );
        assert_eq!(titles(store.list(Some("dune".into()), 1).await.unwrap()), vec![1]);
        assert!(store.list(Some("hyperion".into()), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearest_excludes_seed_and_orders() {
        let index = InMemoryVectorIndex::new(2);
        index
            .upsert_embeddings(vec![
                indexed(Book::new(1, "seed"), vec![1.0, 0.0]),
                indexed(Book::new(2, "close"), vec![0.9, 0.1]),
                indexed(Book::new(3, "far"), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.nearest(&[1.0, 0.0], 5, Some(BookId(1))).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let index = InMemoryVectorIndex::new(3);
        let err = index
            .upsert_embeddings(vec![indexed(Book::new(1, "x"), vec![1.0])])
            .await;
        assert!(err.is_err());
        assert!(index.nearest(&[1.0, 0.0], 1, None).await.is_err());
    }

    #[tokio::test]
    async fn test_score_candidates_applies_filter_and_lexical() {
        let index = InMemoryVectorIndex::new(2);
        index
            .upsert_embeddings(vec![
                indexed(
                    Book::new(1, "Desert Planet").with_language("en"),
                    vec![1.0, 0.0],
                ),
                indexed(Book::new(2, "Ocean World").with_language("fr"), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = CandidateFilter {
            language: Some("en".into()),
            ..CandidateFilter::default()
        };
        let scored = index
            .score_candidates(&[1.0, 0.0], "desert", &filter)
            .await
            .unwrap();

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].book_id, BookId(1));
        assert!((scored[0].vscore - 1.0).abs() < 1e-9);
        assert!(scored[0].tscore > 0.0);
    }
}
