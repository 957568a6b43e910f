// ============================================
// Background Jobs Module
// ============================================
//
// Contains job runners for:
// 1. Embedding backfill (catalog text → vectors → index)
//
// The binary runs the backfill once at startup, before serving requests.

pub mod embedding_backfill;

pub use embedding_backfill::{book_to_text, BackfillConfig, BackfillStats, EmbeddingBackfillJob};
