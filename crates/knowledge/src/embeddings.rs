//! Query and record embeddings.
//!
//! Embedding computation is pluggable. The only built-in provider is the
//! deterministic trigram hasher used for development and tests.

use scout_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the built-in trigram provider.
pub const MOCK_PROVIDER: &str = "mock";

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    fn provider_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::Knowledge("Embedder returned no vector".to_string()))
    }
}

/// Build the embedder named in configuration.
pub fn create_embedder(name: &str, dimensions: usize) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if dimensions == 0 {
        return Err(AppError::Config(
            "Embedding dimensions must be greater than zero".to_string(),
        ));
    }

    match name {
        MOCK_PROVIDER => Ok(Arc::new(TrigramEmbedder::new(dimensions))),
        other => Err(AppError::Config(format!(
            "Unknown embedding provider '{}'. Supported: {}",
            other, MOCK_PROVIDER
        ))),
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "whats",
];

/// Deterministic content-aware embedder.
///
/// Each significant word contributes its character trigrams and the word
/// itself to hashed dimensions; the result is unit-normalized. Texts that
/// share vocabulary score high cosine similarity.
#[derive(Debug, Clone)]
pub struct TrigramEmbedder {
    dimensions: usize,
}

impl TrigramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        let lower = text.to_lowercase();
        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &frequencies {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let hash = window
                    .iter()
                    .fold(0u64, |acc, c| acc.wrapping_mul(37).wrapping_add(*c as u64));
                vector[(hash as usize) % self.dimensions] += (*freq as f32).sqrt();
            }

            let hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            vector[(hash as usize) % self.dimensions] += *freq as f32;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramEmbedder {
    fn provider_name(&self) -> &str {
        MOCK_PROVIDER
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    #[tokio::test]
    async fn test_embed_is_normalized() {
        let embedder = TrigramEmbedder::new(384);
        let v = embedder.embed("roof repair scheduled").await.unwrap();
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_deterministic() {
        let embedder = TrigramEmbedder::new(64);
        assert_eq!(embedder.embed_text("roof repair"), embedder.embed_text("roof repair"));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = TrigramEmbedder::new(384);
        let query = embedder.embed_text("status of the roof repair");
        let related = embedder.embed_text("Roof repair: contractor booked for Friday");
        let unrelated = embedder.embed_text("Quarterly marketing budget review");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_stop_words_only_is_zero_vector() {
        let v = TrigramEmbedder::new(16).embed_text("the and of");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_create_embedder() {
        let embedder = create_embedder("mock", 128).unwrap();
        assert_eq!(embedder.provider_name(), "mock");
        assert_eq!(embedder.dimensions(), 128);
        assert!(create_embedder("openai", 128).is_err());
        assert!(create_embedder("mock", 0).is_err());
    }
}
