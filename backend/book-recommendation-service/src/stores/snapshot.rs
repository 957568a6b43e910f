use super::{InMemoryBookStore, InMemoryRatingStore};
use crate::models::{Book, Rating};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// JSON export of the catalog: `{ "books": [...], "ratings": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
}

impl CatalogSnapshot {
    /// Load a snapshot from disk. A missing or empty file yields an empty catalog.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Ok(Self::default());
        }

        if !path.exists() {
            warn!("Catalog snapshot missing: {}", path.display());
            return Ok(Self::default());
        }

        let data = fs::read(path)
            .with_context(|| format!("Failed to read catalog snapshot {}", path.display()))?;
        if data.is_empty() {
            return Ok(Self::default());
        }

        let snapshot: CatalogSnapshot = serde_json::from_slice(&data)
            .with_context(|| format!("Invalid catalog snapshot {}", path.display()))?;

        info!(
            books = snapshot.books.len(),
            ratings = snapshot.ratings.len(),
            "Catalog snapshot loaded"
        );

        Ok(snapshot)
    }

    /// Split into the read-only stores the core consumes.
    pub fn into_stores(self) -> (InMemoryBookStore, InMemoryRatingStore) {
        (
            InMemoryBookStore::new(self.books),
            InMemoryRatingStore::new(self.ratings),
        )
    }
}
