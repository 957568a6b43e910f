use async_trait::async_trait;
use book_recommendation_service::{
    jobs::BackfillConfig,
    models::{Book, BookId, Channel, HybridWeights, QueryFilters, Rating, RecommendRequest, UserId},
    services::FALLBACK_EXPLANATION,
    stores::{
        CatalogSnapshot, EmbeddingProvider, HashingEmbedder, InMemoryBookStore,
        InMemoryRatingStore, InMemoryVectorIndex,
    },
    BookSearchService, EmbeddingBackfillJob, HybridRecommender, RecommendationError,
    RecommendationSettings,
};
use std::io::Write;
use std::sync::Arc;

const DIM: usize = 64;

fn catalog() -> Vec<Book> {
    vec![
        Book::new(1, "Dune")
            .with_author("Frank Herbert")
            .with_year(1965)
            .with_pages(412)
            .with_language("en")
            .with_fiction(true)
            .with_description("A desert planet and its spice.\nSubjects: science fiction | ecology"),
        Book::new(2, "Dune Messiah")
            .with_author("Frank Herbert")
            .with_year(1969)
            .with_pages(256)
            .with_language("en")
            .with_fiction(true)
            .with_description("Paul rules the empire.\nSubjects: science fiction | politics"),
        Book::new(3, "Solaris")
            .with_author("Stanisław Lem")
            .with_year(1961)
            .with_language("pl")
            .with_fiction(true)
            .with_description("An ocean planet that thinks.\nSubjects: science fiction"),
        Book::new(4, "The Left Hand of Darkness")
            .with_author("Ursula K. Le Guin")
            .with_year(1969)
            .with_language("en")
            .with_fiction(true),
        Book::new(5, "Silent Spring")
            .with_author("Rachel Carson")
            .with_year(1962)
            .with_language("en")
            .with_fiction(false)
            .with_description("Pesticides and the living world.\nSubjects: ecology"),
    ]
}

/// Reader 0 rated Dune and Dune Messiah; Solaris scores 4.2 for them.
fn ratings() -> Vec<Rating> {
    vec![
        Rating::new(0, 1, 5.0),
        Rating::new(0, 2, 4.0),
        Rating::new(1, 1, 6.0),
        Rating::new(1, 3, 4.0),
        Rating::new(2, 2, 4.0),
        Rating::new(2, 3, 3.0),
        Rating::new(3, 1, 1.0),
        Rating::new(4, 1, 1.0),
        Rating::new(5, 1, 1.0),
        Rating::new(6, 2, 4.0),
        Rating::new(7, 2, 4.0),
    ]
}

fn settings() -> RecommendationSettings {
    RecommendationSettings {
        min_overlap: 1,
        ..RecommendationSettings::default()
    }
}

struct Harness {
    recommender: HybridRecommender,
    search: BookSearchService,
}

async fn harness_from(snapshot: CatalogSnapshot) -> Harness {
    let books_to_index = snapshot.books.clone();
    let (books, ratings) = snapshot.into_stores();
    let books = Arc::new(books);
    let ratings = Arc::new(ratings);

    let embedder = Arc::new(HashingEmbedder::new("feature-hash-v1", DIM).unwrap());
    let index = Arc::new(InMemoryVectorIndex::new(DIM));
    EmbeddingBackfillJob::new(BackfillConfig::default(), embedder.clone(), index.clone())
        .run(books_to_index)
        .await
        .unwrap();

    Harness {
        recommender: HybridRecommender::new(
            ratings.clone(),
            books.clone(),
            embedder.clone(),
            index.clone(),
            settings(),
        ),
        search: BookSearchService::new(ratings, books, embedder, index, settings()),
    }
}

async fn harness() -> Harness {
    harness_from(CatalogSnapshot {
        books: catalog(),
        ratings: ratings(),
    })
    .await
}

#[tokio::test]
async fn test_reader_only_request_uses_collaborative_channel() {
    let h = harness().await;
    let request = RecommendRequest::for_user(0).with_weights(HybridWeights {
        cf: 1.0,
        semantic: 0.0,
        seed: 0.5,
        query: 0.5,
    });

    let response = h.recommender.recommend(request).await.unwrap();
    let ids: Vec<BookId> = response.results.iter().map(|r| r.book.id).collect();

    // A single CF candidate normalizes to 0.
    assert_eq!(ids, vec![BookId(3)]);
    assert_eq!(response.results[0].score, 0.0);
    assert_eq!(response.results[0].explanation, FALLBACK_EXPLANATION);
    assert_eq!(response.stats.cf_candidates, 1);
    assert_eq!(response.user_id, Some(UserId(0)));
}

#[tokio::test]
async fn test_seed_request_properties() {
    let h = harness().await;
    let request = RecommendRequest::for_seed(1).with_weights(HybridWeights {
        cf: 0.5,
        semantic: 0.5,
        seed: 0.5,
        query: 0.5,
    });

    let response = h.recommender.recommend(request).await.unwrap();
    assert!(!response.results.is_empty());
    assert!(response.results.iter().all(|r| r.book.id != BookId(1)));

    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for result in &response.results {
        assert!((0.0..=1.0).contains(&result.channels.cf));
        assert!((0.0..=1.0).contains(&result.channels.semantic));
        assert!(result.score <= 1.0 + 1e-9);
        let expected = 0.5 * result.channels.cf + 0.5 * result.channels.semantic;
        assert!((result.score - expected).abs() < 1e-9);
    }

    let messiah = response
        .results
        .iter()
        .find(|r| r.book.id == BookId(2))
        .unwrap();
    assert!(messiah
        .explanation
        .starts_with("Because it's same author (Frank Herbert); shared subjects: science fiction"));
}

#[tokio::test]
async fn test_query_filters_apply_before_ranking() {
    let h = harness().await;
    let request = RecommendRequest::for_query("ecology")
        .with_hybrid_weight(0.0)
        .with_weights(HybridWeights {
            cf: 0.0,
            semantic: 1.0,
            seed: 0.0,
            query: 1.0,
        })
        .with_filters(QueryFilters {
            lang: Some("en".to_string()),
            exclude_rated_user_id: Some(UserId(0)),
            ..QueryFilters::default()
        });

    let response = h.recommender.recommend(request).await.unwrap();
    let ids: Vec<BookId> = response.results.iter().map(|r| r.book.id).collect();

    assert_eq!(ids, vec![BookId(5), BookId(4)]);
    assert!((response.results[0].score - 1.0).abs() < 1e-9);
    assert_eq!(response.results[1].score, 0.0);
    assert_eq!(response.stats.query_candidates, 2);
}

#[tokio::test]
async fn test_recommendations_are_deterministic() {
    let h = harness().await;
    let request = RecommendRequest::for_seed(2)
        .with_user(0)
        .with_query("planet")
        .with_weights(HybridWeights {
            cf: 0.4,
            semantic: 0.6,
            seed: 0.5,
            query: 0.5,
        });

    let first = h.recommender.recommend(request.clone()).await.unwrap();
    for _ in 0..5 {
        let again = h.recommender.recommend(request.clone()).await.unwrap();
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn test_unknown_seed_is_not_found() {
    let h = harness().await;
    let err = h
        .recommender
        .recommend(RecommendRequest::for_seed(999).with_query("dune"))
        .await
        .unwrap_err();
    assert!(matches!(err, RecommendationError::NotFound(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_request_without_inputs_is_rejected() {
    let h = harness().await;
    let err = h
        .recommender
        .recommend(RecommendRequest::default().with_k(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

struct OfflineEmbedder;

#[async_trait]
impl EmbeddingProvider for OfflineEmbedder {
    async fn encode_docs(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding backend offline")
    }

    async fn encode_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding backend offline")
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

#[tokio::test]
async fn test_provider_outage_propagates_as_upstream() {
    let recommender = HybridRecommender::new(
        Arc::new(InMemoryRatingStore::new(ratings())),
        Arc::new(InMemoryBookStore::new(catalog())),
        Arc::new(OfflineEmbedder),
        Arc::new(InMemoryVectorIndex::new(DIM)),
        settings(),
    );

    let err = recommender
        .recommend(RecommendRequest::for_user(0).with_query("desert"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RecommendationError::Upstream {
            channel: Channel::SemanticQuery,
            ..
        }
    ));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_search_and_similar_books() {
    let h = harness().await;

    let hits = h
        .search
        .search("desert", 3, 0.0, &QueryFilters::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].book.id, BookId(1));
    assert!(hits[0].lexical > 0.0);
    assert_eq!(
        hits[0].snippet.as_deref(),
        Some("A desert planet and its spice. Subjects: science fiction | ecology")
    );

    let similar = h.search.similar_books(BookId(1), 2).await.unwrap();
    assert_eq!(similar.len(), 2);
    assert!(similar.iter().all(|s| s.book.id != BookId(1)));
    assert!(similar[0].cosine >= similar[1].cosine);

    let err = h.search.similar_books(BookId(999), 2).await.unwrap_err();
    assert!(matches!(err, RecommendationError::NotFound(_)));
}

#[tokio::test]
async fn test_catalog_listing() {
    let h = harness().await;

    let dune: Vec<BookId> = h
        .search
        .list_books(Some("dune"), 20)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(dune, vec![BookId(1), BookId(2)]);

    let first = h.search.list_books(None, 3).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].title, "Dune");
    assert_eq!(first[0].author.as_deref(), Some("Frank Herbert"));
}

#[tokio::test]
async fn test_pipeline_from_snapshot_file() {
    let snapshot = CatalogSnapshot {
        books: catalog(),
        ratings: ratings(),
    };
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&snapshot).unwrap()).unwrap();

    let loaded = CatalogSnapshot::load(file.path()).unwrap();
    assert_eq!(loaded.books.len(), 5);

    let h = harness_from(loaded).await;
    let response = h
        .recommender
        .recommend(RecommendRequest::for_query("spice").with_k(2))
        .await
        .unwrap();
    assert!(response.results.len() <= 2);
    assert_eq!(response.k, 2);
}
