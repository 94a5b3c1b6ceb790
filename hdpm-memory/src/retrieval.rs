//! Ranking of stored insights against a query

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::entity::{Insight, PolicyPathway};
use crate::error::{Error, Result};
use crate::memory::MemoryStore;
use crate::scoring::{KeywordOverlapScorer, RelevanceScorer};

/// An insight that was retrieved, with its source pathway and relevance score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedExperience {
    pub insight: Insight,
    pub pathway: PolicyPathway,
    pub score: f32,
}

/// Retrieval engine for ranking insights in a store
#[derive(Clone)]
pub struct RetrievalEngine {
    scorer: Arc<dyn RelevanceScorer>,
    min_score: Option<f32>,
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::new(Arc::new(KeywordOverlapScorer))
    }
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("min_score", &self.min_score)
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    /// Create a new retrieval engine around a scorer
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            scorer,
            min_score: None,
        }
    }

    /// Create an engine with the configured score threshold
    pub fn from_config(scorer: Arc<dyn RelevanceScorer>, config: &Config) -> Self {
        Self::new(scorer).with_min_score(config.min_score)
    }

    /// Drop candidates scoring below `min_score`
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Return the `top_k` most relevant insights of `store`, each with its pathway
    ///
    /// Ordered by descending score; equal scores keep store insertion order.
    /// Stores holding fewer than `top_k` insights return all of them.
    pub fn retrieve(
        &self,
        store: &MemoryStore,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedExperience>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let insights: Vec<&Insight> = store.all_insights().collect();
        let contents: Vec<&str> = insights.iter().map(|i| i.content.as_str()).collect();
        let scores = self.scorer.score_batch(query, &contents)?;
        if scores.len() != insights.len() {
            return Err(Error::scoring(format!(
                "scorer returned {} scores for {} insights",
                scores.len(),
                insights.len()
            )));
        }

        let mut scored: Vec<(f32, &Insight)> = scores
            .into_iter()
            .zip(insights)
            .filter(|(score, _)| self.min_score.map_or(true, |min| *score >= min))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|(a, _), (b, _)| rank(*b, *a));
        scored.truncate(top_k);

        let results = scored
            .into_iter()
            .map(|(score, insight)| {
                let pathway = store.get_pathway(&insight.source_pathway_id)?;
                Ok(RetrievedExperience {
                    insight: insight.clone(),
                    pathway: pathway.clone(),
                    score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            query,
            top_k,
            returned = results.len(),
            "Retrieved insights"
        );
        Ok(results)
    }
}

/// Total order on scores with NaN below every number
fn rank(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
