// ============================================
// Embedding Backfill Job
// ============================================
//
// Encodes every catalog book and upserts the vectors into the index.
//
// Workflow:
// 1. Build one document per book (title, author, truncated description)
// 2. Encode documents in batches through the shared EmbeddingProvider
// 3. Upsert (book, embedding) pairs into the EmbeddingSink

use crate::config::EmbeddingConfig;
use crate::error::{RecommendationError, Result};
use crate::models::{Book, Embedding};
use crate::stores::{EmbeddingProvider, EmbeddingSink, IndexedBook};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub batch_size: usize,
    pub max_description_chars: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            max_description_chars: 4000,
        }
    }
}

impl From<&EmbeddingConfig> for BackfillConfig {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.embed_batch_size,
            max_description_chars: config.max_description_chars,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackfillStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub seen: usize,
    pub upserted: usize,
    pub batches: usize,
    pub duration_ms: u64,
}

impl BackfillStats {
    /// `(seen, upserted)`.
    pub fn counts(&self) -> (usize, usize) {
        (self.seen, self.upserted)
    }
}

/// Document text for a book: non-empty title, author and description
/// (cut to `max_description_chars`) joined with ". ". Falls back to the
/// title when nothing else is usable.
pub fn book_to_text(book: &Book, max_description_chars: usize) -> String {
    let description = book
        .description
        .as_deref()
        .map(|d| d.chars().take(max_description_chars).collect::<String>());

    let parts: Vec<&str> = [
        Some(book.title.as_str()),
        book.author.as_deref(),
        description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect();

    if parts.is_empty() {
        book.title.clone()
    } else {
        parts.join(". ")
    }
}

pub struct EmbeddingBackfillJob {
    config: BackfillConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    sink: Arc<dyn EmbeddingSink>,
}

impl EmbeddingBackfillJob {
    pub fn new(
        config: BackfillConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        sink: Arc<dyn EmbeddingSink>,
    ) -> Self {
        Self {
            config,
            embedder,
            sink,
        }
    }

    /// Encode and upsert every book in `books`.
    ///
    /// Fails with `Config` before encoding anything when the embedder and
    /// the sink disagree on vector length.
    pub async fn run(&self, books: Vec<Book>) -> Result<BackfillStats> {
        let (embed_dim, sink_dim) = (self.embedder.dimension(), self.sink.dimension());
        if embed_dim != sink_dim {
            return Err(RecommendationError::Config(format!(
                "Embedding dimension {} does not match index dimension {}",
                embed_dim, sink_dim
            )));
        }

        let start_time = Instant::now();
        let mut stats = BackfillStats {
            started_at: Some(Utc::now()),
            seen: books.len(),
            ..Default::default()
        };

        info!(
            books = stats.seen,
            batch_size = self.config.batch_size,
            "Starting embedding backfill"
        );

        let batch_size = self.config.batch_size.max(1);
        for (batch_idx, chunk) in books.chunks(batch_size).enumerate() {
            let docs: Vec<String> = chunk
                .iter()
                .map(|book| book_to_text(book, self.config.max_description_chars))
                .collect();

            let vectors = self.embedder.encode_docs(&docs).await.map_err(|e| {
                RecommendationError::Internal(format!(
                    "Embedding batch {} failed: {}",
                    batch_idx + 1,
                    e
                ))
            })?;
            if vectors.len() != chunk.len() {
                return Err(RecommendationError::Internal(format!(
                    "Embedding batch {} returned {} vectors for {} documents",
                    batch_idx + 1,
                    vectors.len(),
                    chunk.len()
                )));
            }

            let entries: Vec<IndexedBook> = chunk
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(book, vector)| IndexedBook {
                    embedding: Embedding::book(book.id, vector),
                    book,
                })
                .collect();

            let stored = self.sink.upsert_embeddings(entries).await.map_err(|e| {
                RecommendationError::Internal(format!(
                    "Upsert of batch {} failed: {}",
                    batch_idx + 1,
                    e
                ))
            })?;

            stats.upserted += stored;
            stats.batches += 1;
            debug!(batch = batch_idx + 1, stored, "Embedding batch upserted");
        }

        stats.completed_at = Some(Utc::now());
        stats.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            seen = stats.seen,
            upserted = stats.upserted,
            batches = stats.batches,
            duration_ms = stats.duration_ms,
            "Embedding backfill completed"
        );
        Ok(stats)
    }
}
