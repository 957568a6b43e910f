use super::EmbeddingProvider;
use crate::utils::lexical::tokenize;
use anyhow::{ensure, Result};
use async_trait::async_trait;
use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed};

/// Model-free embedding provider based on signed feature hashing.
///
/// Each lowercase token is hashed into one of `dimension` buckets with a
/// sign taken from the top hash bit; the bag is then L2-normalised so that
/// cosine similarity reflects shared vocabulary. Output is deterministic
/// across processes, which keeps rankings reproducible in tests and local runs.
///
/// The hash seed is derived from the model name, so vectors produced under
/// different names live in unrelated spaces.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    seed: u64,
}

impl HashingEmbedder {
    pub fn new(model_name: &str, dimension: usize) -> Result<Self> {
        ensure!(dimension > 0, "embedding dimension must be positive");
        Ok(Self {
            dimension,
            seed: xxh3_64(model_name.as_bytes()),
        })
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let hash = xxh3_64_with_seed(token.as_bytes(), self.seed);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn encode_docs(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    async fn encode_query(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dense_cosine;

    #[tokio::test]
    async fn test_blank_query_encodes_to_empty_vector() {
        let embedder = HashingEmbedder::new("feature-hash-v1", 64).unwrap();
        assert!(embedder.encode_query("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_docs_input() {
        let embedder = HashingEmbedder::new("feature-hash-v1", 64).unwrap();
        assert!(embedder.encode_docs(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vectors_are_normalised_and_deterministic() {
        let embedder = HashingEmbedder::new("feature-hash-v1", 128).unwrap();
        let docs = vec!["desert planet spice".to_string()];
        let first = embedder.encode_docs(&docs).await.unwrap();
        let second = embedder.encode_docs(&docs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].len(), 128);
        let norm: f32 = first[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::new("feature-hash-v1", 256).unwrap();
        let query = embedder.encode_query("desert spice").await.unwrap();
        let docs = embedder
            .encode_docs(&[
                "the desert spice trade".to_string(),
                "a quiet village romance".to_string(),
            ])
            .await
            .unwrap();

        let near = dense_cosine(&query, &docs[0]).unwrap();
        let far = dense_cosine(&query, &docs[1]).unwrap();
        assert!(near > far);
    }

    #[tokio::test]
    async fn test_model_name_selects_hash_space() {
        let docs = vec!["desert planet spice".to_string()];
        let v1 = HashingEmbedder::new("feature-hash-v1", 64).unwrap();
        let v2 = HashingEmbedder::new("feature-hash-v2", 64).unwrap();
        let again = HashingEmbedder::new("feature-hash-v1", 64).unwrap();

        let first = v1.encode_docs(&docs).await.unwrap();
        assert_eq!(first, again.encode_docs(&docs).await.unwrap());
        assert_ne!(first, v2.encode_docs(&docs).await.unwrap());
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        assert!(HashingEmbedder::new("feature-hash-v1", 0).is_err());
    }
}
