//! Semantic relevance scoring using fastembed (local, no API keys)

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::scoring::RelevanceScorer;

/// Cosine similarity between locally computed sentence embeddings
pub struct EmbeddingScorer {
    model: Mutex<TextEmbedding>,
}

impl EmbeddingScorer {
    /// Load the embedding model
    pub fn new() -> Result<Self> {
        // all-MiniLM-L6-v2: 384 dimensions, downloads to ~/.cache/fastembed on first use
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
        )
        .map_err(|e| Error::embedding(format!("Failed to load embedding model: {}", e)))?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }

    /// Embed `query` followed by every candidate in a single model call
    fn embed_all(&self, query: &str, candidates: &[&str]) -> Result<(Vec<f32>, Vec<Vec<f32>>)> {
        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(query.to_string());
        texts.extend(candidates.iter().map(|c| c.to_string()));

        let mut model = self.model.lock();
        let mut embeddings = model
            .embed(texts, None)
            .map_err(|e| Error::embedding(format!("Embedding failed: {}", e)))?;

        if embeddings.len() != candidates.len() + 1 {
            return Err(Error::embedding(format!(
                "Embedding model returned {} vectors for {} texts",
                embeddings.len(),
                candidates.len() + 1
            )));
        }
        let query_embedding = embeddings.remove(0);
        Ok((query_embedding, embeddings))
    }
}

impl RelevanceScorer for EmbeddingScorer {
    fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let scores = self.score_batch(query, &[candidate])?;
        scores
            .into_iter()
            .next()
            .ok_or_else(|| Error::scoring("no score for candidate"))
    }

    fn score_batch(&self, query: &str, candidates: &[&str]) -> Result<Vec<f32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let (q, embedded) = self
            .embed_all(query, candidates)
            .map_err(|e| Error::scoring(e.to_string()))?;
        Ok(embedded.iter().map(|c| cosine_similarity(&q, c)).collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let s = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((s - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
