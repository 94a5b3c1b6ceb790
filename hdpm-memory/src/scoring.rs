//! Relevance scoring between a query and stored insight text

use std::collections::HashSet;

use crate::error::Result;

/// Scores how relevant a candidate text is to a query
///
/// Higher is more relevant. Implementations must be pure functions of their
/// inputs so that retrieval stays deterministic.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, query: &str, candidate: &str) -> Result<f32>;

    /// Score every candidate against one query, in candidate order
    fn score_batch(&self, query: &str, candidates: &[&str]) -> Result<Vec<f32>> {
        candidates
            .iter()
            .map(|candidate| self.score(query, candidate))
            .collect()
    }
}

/// Counts the distinct terms shared by query and candidate
///
/// Terms are lowercased, hyphens split words and other punctuation is
/// dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordOverlapScorer;

impl RelevanceScorer for KeywordOverlapScorer {
    fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(0.0);
        }
        let candidate_terms = terms(candidate);
        Ok(query_terms.intersection(&candidate_terms).count() as f32)
    }
}

/// Normalized term set of a text
pub fn terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect()
}
