use book_recommendation_service::{
    jobs::BackfillConfig,
    models::{BookId, QueryFilters, RecommendRequest},
    stores::{CatalogSnapshot, HashingEmbedder, InMemoryVectorIndex},
    BookSearchService, Config, EmbeddingBackfillJob, HybridRecommender, RecommendationError,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One line of worker input, dispatched on `op`.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum WorkerRequest {
    Recommend(RecommendRequest),
    Search(SearchRequest),
    Similar(SimilarRequest),
    Books(ListBooksRequest),
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(alias = "q")]
    query: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    hybrid_weight: Option<f64>,
    #[serde(default, flatten)]
    filters: QueryFilters,
}

#[derive(Debug, Deserialize)]
struct SimilarRequest {
    book_id: BookId,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ListBooksRequest {
    #[serde(default, alias = "query")]
    q: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

struct Worker {
    recommender: HybridRecommender,
    search: BookSearchService,
    default_k: usize,
    hybrid_weight: f64,
}

impl Worker {
    async fn handle_line(&self, line: &str) -> Value {
        let request: WorkerRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                return error_reply(&RecommendationError::Validation(format!(
                    "Malformed request: {}",
                    e
                )))
            }
        };

        let outcome = match request {
            WorkerRequest::Recommend(request) => self
                .recommender
                .recommend(request)
                .await
                .and_then(|response| to_value(&response)),
            WorkerRequest::Search(request) => {
                let k = request.k.unwrap_or(self.default_k);
                let hybrid_weight = request.hybrid_weight.unwrap_or(self.hybrid_weight);
                self.search
                    .search(&request.query, k, hybrid_weight, &request.filters)
                    .await
                    .and_then(|results| {
                        to_value(&json!({
                            "query": request.query.trim(),
                            "k": k,
                            "results": results,
                        }))
                    })
            }
            WorkerRequest::Similar(request) => {
                let k = request.k.unwrap_or(self.default_k);
                self.search
                    .similar_books(request.book_id, k)
                    .await
                    .and_then(|results| {
                        to_value(&json!({
                            "book_id": request.book_id,
                            "results": results,
                        }))
                    })
            }
            WorkerRequest::Books(request) => {
                let limit = request.limit.unwrap_or(self.default_k);
                self.search
                    .list_books(request.q.as_deref(), limit)
                    .await
                    .and_then(|results| to_value(&json!({ "limit": limit, "results": results })))
            }
        };

        match outcome {
            Ok(value) => value,
            Err(e) => {
                if e.is_client_error() {
                    warn!(error = %e, kind = e.kind(), "Request rejected");
                } else {
                    error!(error = %e, kind = e.kind(), "Request failed");
                }
                error_reply(&e)
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> book_recommendation_service::Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| RecommendationError::Internal(format!("Failed to encode response: {}", e)))
}

fn error_reply(err: &RecommendationError) -> Value {
    json!({ "error": err.to_string(), "kind": err.kind() })
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.service.log_level.clone()));

    // stdout carries responses, so logs go to stderr.
    if config.service.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        "Starting {} (model: {}, dim: {})",
        config.service.service_name, config.embedding.embed_model, config.embedding.embed_dim
    );

    let snapshot = CatalogSnapshot::load(&config.service.catalog_path)?;
    let books_to_index = snapshot.books.clone();
    let (books, ratings) = snapshot.into_stores();
    let books = Arc::new(books);
    let ratings = Arc::new(ratings);

    let embedder = Arc::new(HashingEmbedder::new(
        &config.embedding.embed_model,
        config.embedding.embed_dim,
    )?);
    let index = Arc::new(InMemoryVectorIndex::new(config.embedding.embed_dim));

    let backfill = EmbeddingBackfillJob::new(
        BackfillConfig::from(&config.embedding),
        embedder.clone(),
        index.clone(),
    );
    let (seen, upserted) = backfill.run(books_to_index).await?.counts();
    info!("Embeddings upserted (candidates: {}, inserted: {})", seen, upserted);

    let settings = config.recommendation.clone();
    let worker = Worker {
        recommender: HybridRecommender::new(
            ratings.clone(),
            books.clone(),
            embedder.clone(),
            index.clone(),
            settings.clone(),
        ),
        search: BookSearchService::new(ratings, books, embedder, index, settings.clone()),
        default_k: settings.default_k,
        hybrid_weight: settings.hybrid_weight,
    };

    info!("Ready; reading JSON requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = worker.handle_line(line).await;
        stdout.write_all(reply.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("Input closed, exiting");
    Ok(())
}
