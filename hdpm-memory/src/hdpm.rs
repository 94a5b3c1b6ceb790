//! The dual-pathway aggregate: positive and negative stores side by side

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::entity::{Insight, PolicyPathway};
use crate::error::Result;
use crate::memory::{MemoryStore, StoreCounts, StoreSnapshot};
use crate::prompt::ScaffoldBuilder;
use crate::reflect::{ReflectAgent, Reflection};
use crate::retrieval::{RetrievalEngine, RetrievedExperience};
use crate::scoring::RelevanceScorer;
use crate::trajectory::{AgentRole, TrajectoryStep, Valence};

/// Serializable form of the whole memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HdpmSnapshot {
    #[serde(default)]
    pub positive: StoreSnapshot,

    #[serde(default)]
    pub negative: StoreSnapshot,
}

/// Entity counts for both stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdpmStats {
    pub positive: StoreCounts,
    pub negative: StoreCounts,
}

/// Result of retrieving from both stores with the same query
///
/// Each insight list is index-aligned with its pathway list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoRetrieval {
    pub positive_insights: Vec<Insight>,
    pub positive_pathways: Vec<PolicyPathway>,
    pub negative_insights: Vec<Insight>,
    pub negative_pathways: Vec<PolicyPathway>,
}

impl CoRetrieval {
    fn from_results(positive: Vec<RetrievedExperience>, negative: Vec<RetrievedExperience>) -> Self {
        let (positive_insights, positive_pathways) =
            positive.into_iter().map(|r| (r.insight, r.pathway)).unzip();
        let (negative_insights, negative_pathways) =
            negative.into_iter().map(|r| (r.insight, r.pathway)).unzip();
        Self {
            positive_insights,
            positive_pathways,
            negative_insights,
            negative_pathways,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positive_insights.is_empty() && self.negative_insights.is_empty()
    }
}

/// Hierarchical dual-pathway memory
#[derive(Debug, Clone)]
pub struct Hdpm {
    positive: MemoryStore,
    negative: MemoryStore,
    engine: RetrievalEngine,
    max_evidence_per_section: usize,
}

impl Default for Hdpm {
    fn default() -> Self {
        Self {
            positive: MemoryStore::new(),
            negative: MemoryStore::new(),
            engine: RetrievalEngine::default(),
            max_evidence_per_section: 3,
        }
    }
}

impl Hdpm {
    /// Create an empty memory with keyword-overlap retrieval
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty memory using the configured limits and the given scorer
    pub fn from_config(config: &Config, scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            engine: RetrievalEngine::from_config(scorer, config),
            max_evidence_per_section: config.max_evidence_per_section,
            ..Self::default()
        }
    }

    /// Replace the retrieval engine
    pub fn with_engine(mut self, engine: RetrievalEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Rebuild a memory from a snapshot, using keyword-overlap retrieval
    pub fn from_snapshot(snapshot: HdpmSnapshot) -> Result<Self> {
        let mut hdpm = Self::new();
        hdpm.restore(snapshot)?;
        Ok(hdpm)
    }

    /// Replace both stores with the contents of a snapshot
    ///
    /// The current contents are kept if the snapshot is invalid.
    pub fn restore(&mut self, snapshot: HdpmSnapshot) -> Result<()> {
        self.restore_and_persist(snapshot, |_| Ok(()))
    }

    /// Validate `snapshot`, hand it to `persist`, and only then swap it in
    ///
    /// The current contents are kept if validation or `persist` fails.
    pub fn restore_and_persist<F>(&mut self, snapshot: HdpmSnapshot, persist: F) -> Result<()>
    where
        F: FnOnce(&HdpmSnapshot) -> Result<()>,
    {
        let positive = MemoryStore::from_snapshot(snapshot.positive.clone())?;
        let negative = MemoryStore::from_snapshot(snapshot.negative.clone())?;
        persist(&snapshot)?;
        self.positive = positive;
        self.negative = negative;

        let stats = self.stats();
        info!(
            positive_insights = stats.positive.insights,
            negative_insights = stats.negative.insights,
            "Restored memory from snapshot"
        );
        Ok(())
    }

    pub fn to_snapshot(&self) -> HdpmSnapshot {
        HdpmSnapshot {
            positive: self.positive.to_snapshot(),
            negative: self.negative.to_snapshot(),
        }
    }

    pub fn positive(&self) -> &MemoryStore {
        &self.positive
    }

    pub fn negative(&self) -> &MemoryStore {
        &self.negative
    }

    /// The store holding experiences of `valence`
    pub fn store(&self, valence: Valence) -> &MemoryStore {
        match valence {
            Valence::Positive => &self.positive,
            Valence::Negative => &self.negative,
        }
    }

    pub(crate) fn store_mut(&mut self, valence: Valence) -> &mut MemoryStore {
        match valence {
            Valence::Positive => &mut self.positive,
            Valence::Negative => &mut self.negative,
        }
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    pub fn stats(&self) -> HdpmStats {
        HdpmStats {
            positive: self.positive.counts(),
            negative: self.negative.counts(),
        }
    }

    /// Retrieve the `top_k` most relevant experiences from each store
    pub fn global_co_retrieval(&self, query: &str, top_k: usize) -> Result<CoRetrieval> {
        let positive = self.engine.retrieve(&self.positive, query, top_k)?;
        let negative = self.engine.retrieve(&self.negative, query, top_k)?;
        Ok(CoRetrieval::from_results(positive, negative))
    }

    /// Compose one prompt per agent role from co-retrieved experience
    ///
    /// At least one experience per store is consulted, even for a `top_k` of 0.
    /// A store with no relevant experience contributes no section, so an empty
    /// memory yields prompts that only state the task.
    pub fn generate_role_specific_prompts(
        &self,
        query: &str,
        top_k_retrieval: usize,
    ) -> Result<BTreeMap<AgentRole, String>> {
        let retrieved = self.global_co_retrieval(query, top_k_retrieval.max(1))?;
        ScaffoldBuilder {
            positive: &self.positive,
            negative: &self.negative,
            max_evidence: self.max_evidence_per_section,
        }
        .build_all(query, &retrieved)
    }
}

/// An [`Hdpm`] shared between threads
///
/// Filing holds the write lock for its whole duration and is rolled back
/// unless every entity was filed; readers never observe a half-filed pathway.
#[derive(Debug, Clone, Default)]
pub struct SharedHdpm {
    inner: Arc<RwLock<Hdpm>>,
}

impl SharedHdpm {
    pub fn new(hdpm: Hdpm) -> Self {
        Self {
            inner: Arc::new(RwLock::new(hdpm)),
        }
    }

    /// File a completed trajectory, all or nothing
    pub fn update_memory(
        &self,
        agent: &ReflectAgent,
        trajectory: &[TrajectoryStep],
        outcome: i32,
    ) -> Result<Reflection> {
        let mut hdpm = self.inner.write();
        agent.update_memory_atomic(trajectory, outcome, &mut hdpm)
    }

    pub fn global_co_retrieval(&self, query: &str, top_k: usize) -> Result<CoRetrieval> {
        self.inner.read().global_co_retrieval(query, top_k)
    }

    pub fn generate_role_specific_prompts(
        &self,
        query: &str,
        top_k_retrieval: usize,
    ) -> Result<BTreeMap<AgentRole, String>> {
        self.inner
            .read()
            .generate_role_specific_prompts(query, top_k_retrieval)
    }

    pub fn to_snapshot(&self) -> HdpmSnapshot {
        self.inner.read().to_snapshot()
    }

    pub fn restore(&self, snapshot: HdpmSnapshot) -> Result<()> {
        self.inner.write().restore(snapshot)
    }

    /// Borrow the memory for reading
    pub fn read(&self) -> RwLockReadGuard<'_, Hdpm> {
        self.inner.read()
    }
}
