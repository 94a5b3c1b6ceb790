//! Single-valence memory store holding the evidence/pathway/insight graph

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entity::{AtomicEvidenceCard, Insight, PolicyPathway};
use crate::error::{Error, Result};

/// Flat, serializable form of a [`MemoryStore`]
///
/// Each collection is keyed by entity ID and keeps insertion order, so a
/// round trip reproduces iteration order exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub evidence: IndexMap<String, AtomicEvidenceCard>,

    #[serde(default)]
    pub pathways: IndexMap<String, PolicyPathway>,

    #[serde(default)]
    pub insights: IndexMap<String, Insight>,
}

/// Entity counts for one store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub evidence: usize,
    pub pathways: usize,
    pub insights: usize,
}

/// Table lengths recorded by [`MemoryStore::checkpoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCheckpoint {
    evidence: usize,
    pathways: usize,
    insights: usize,
}

/// Container for every card, pathway and insight of one valence
///
/// All references held by stored entities resolve within the same store.
/// Mutating operations either succeed completely or leave the store as it was.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    evidence: IndexMap<String, AtomicEvidenceCard>,
    pathways: IndexMap<String, PolicyPathway>,
    insights: IndexMap<String, Insight>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an evidence card
    pub fn add_evidence(&mut self, card: AtomicEvidenceCard) -> Result<String> {
        if self.evidence.contains_key(&card.id) {
            return Err(Error::duplicate(card.id));
        }

        let id = card.id.clone();
        self.evidence.insert(id.clone(), card);
        Ok(id)
    }

    /// Add a pathway whose evidence cards are already stored
    pub fn add_pathway(&mut self, pathway: PolicyPathway) -> Result<String> {
        if self.pathways.contains_key(&pathway.id) {
            return Err(Error::duplicate(pathway.id));
        }

        if let Some(missing) = pathway
            .evidence_card_ids
            .iter()
            .find(|card_id| !self.evidence.contains_key(*card_id))
        {
            return Err(Error::dangling(format!(
                "pathway {} references missing evidence card {}",
                pathway.id, missing
            )));
        }

        if let Some(insight_id) = &pathway.linked_insight_id {
            let resolves = self
                .insights
                .get(insight_id)
                .is_some_and(|insight| insight.source_pathway_id == pathway.id);
            if !resolves {
                return Err(Error::dangling(format!(
                    "pathway {} links to missing insight {}",
                    pathway.id, insight_id
                )));
            }
        }

        let id = pathway.id.clone();
        self.pathways.insert(id.clone(), pathway);
        Ok(id)
    }

    /// Add an insight and link it from its source pathway
    pub fn add_insight(&mut self, insight: Insight) -> Result<String> {
        if self.insights.contains_key(&insight.id) {
            return Err(Error::duplicate(insight.id));
        }

        let pathway = self
            .pathways
            .get_mut(&insight.source_pathway_id)
            .ok_or_else(|| {
                Error::dangling(format!(
                    "insight {} references missing pathway {}",
                    insight.id, insight.source_pathway_id
                ))
            })?;

        if let Some(existing) = &pathway.linked_insight_id {
            return Err(Error::AlreadyLinked {
                pathway_id: pathway.id.clone(),
                insight_id: existing.clone(),
            });
        }

        pathway.linked_insight_id = Some(insight.id.clone());
        let id = insight.id.clone();
        self.insights.insert(id.clone(), insight);
        Ok(id)
    }

    /// Get an evidence card by ID
    pub fn get_evidence(&self, id: &str) -> Result<&AtomicEvidenceCard> {
        self.evidence
            .get(id)
            .ok_or_else(|| Error::not_found(format!("evidence card {}", id)))
    }

    /// Get a pathway by ID
    pub fn get_pathway(&self, id: &str) -> Result<&PolicyPathway> {
        self.pathways
            .get(id)
            .ok_or_else(|| Error::not_found(format!("pathway {}", id)))
    }

    /// Get an insight by ID
    pub fn get_insight(&self, id: &str) -> Result<&Insight> {
        self.insights
            .get(id)
            .ok_or_else(|| Error::not_found(format!("insight {}", id)))
    }

    /// Evidence cards of a pathway, in execution order
    pub fn evidence_for_pathway(&self, pathway_id: &str) -> Result<Vec<&AtomicEvidenceCard>> {
        self.get_pathway(pathway_id)?
            .evidence_card_ids
            .iter()
            .map(|card_id| self.get_evidence(card_id))
            .collect()
    }

    /// All evidence cards in insertion order
    pub fn all_evidence(&self) -> impl Iterator<Item = &AtomicEvidenceCard> + '_ {
        self.evidence.values()
    }

    /// All pathways in insertion order
    pub fn all_pathways(&self) -> impl Iterator<Item = &PolicyPathway> + '_ {
        self.pathways.values()
    }

    /// All insights in insertion order
    pub fn all_insights(&self) -> impl Iterator<Item = &Insight> + '_ {
        self.insights.values()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            evidence: self.evidence.len(),
            pathways: self.pathways.len(),
            insights: self.insights.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty() && self.pathways.is_empty() && self.insights.is_empty()
    }

    /// Mark the current end of each table
    pub fn checkpoint(&self) -> StoreCheckpoint {
        StoreCheckpoint {
            evidence: self.evidence.len(),
            pathways: self.pathways.len(),
            insights: self.insights.len(),
        }
    }

    /// Drop everything added after `checkpoint`
    ///
    /// Entities are only ever appended, so this restores the store exactly,
    /// including links set on older pathways by insights added since.
    pub fn rollback(&mut self, checkpoint: StoreCheckpoint) {
        if checkpoint.insights < self.insights.len() {
            for (_, insight) in self.insights.drain(checkpoint.insights..) {
                if let Some(pathway) = self.pathways.get_mut(&insight.source_pathway_id) {
                    if pathway.linked_insight_id.as_deref() == Some(insight.id.as_str()) {
                        pathway.linked_insight_id = None;
                    }
                }
            }
        }
        self.pathways.truncate(checkpoint.pathways);
        self.evidence.truncate(checkpoint.evidence);
    }

    /// Export the store as flat tables
    pub fn to_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            evidence: self.evidence.clone(),
            pathways: self.pathways.clone(),
            insights: self.insights.clone(),
        }
    }

    /// Rebuild a store from flat tables, re-checking every reference
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let mut store = Self::new();

        for (key, card) in snapshot.evidence {
            check_key("evidence", &key, &card.id)?;
            store.add_evidence(card)?;
        }

        // Links are re-established by add_insight and compared afterwards.
        let mut recorded_links = Vec::with_capacity(snapshot.pathways.len());
        for (key, mut pathway) in snapshot.pathways {
            check_key("pathway", &key, &pathway.id)?;
            recorded_links.push((pathway.id.clone(), pathway.linked_insight_id.take()));
            store.add_pathway(pathway)?;
        }

        for (key, insight) in snapshot.insights {
            check_key("insight", &key, &insight.id)?;
            store.add_insight(insight)?;
        }

        for (pathway_id, recorded) in recorded_links {
            let actual = &store.pathways[&pathway_id].linked_insight_id;
            if *actual != recorded {
                return Err(Error::dangling(format!(
                    "pathway {} records insight link {:?} but insights imply {:?}",
                    pathway_id, recorded, actual
                )));
            }
        }

        Ok(store)
    }
}

fn check_key(kind: &str, key: &str, id: &str) -> Result<()> {
    if key != id {
        return Err(Error::invalid_snapshot(format!(
            "{} keyed as {} carries id {}",
            kind, key, id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::AgentRole;
    use chrono::Utc;

    fn card(id: &str, role: AgentRole) -> AtomicEvidenceCard {
        AtomicEvidenceCard::new(role, format!("content of {}", id), Utc::now()).with_id(id)
    }

    fn populated() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_evidence(card("aec_1", AgentRole::Planner)).unwrap();
        store.add_evidence(card("aec_2", AgentRole::Assistant)).unwrap();
        store
            .add_pathway(PolicyPathway::new(vec!["aec_1".into(), "aec_2".into()]).with_id("pp_1"))
            .unwrap();
        store
            .add_insight(Insight::new("Insight 1", "pp_1").with_id("insight_1"))
            .unwrap();
        store
    }

    #[test]
    fn insight_links_its_pathway() {
        let store = populated();
        let pathway = store.get_pathway("pp_1").unwrap();
        assert_eq!(pathway.linked_insight_id.as_deref(), Some("insight_1"));
        assert_eq!(store.get_insight("insight_1").unwrap().content, "Insight 1");
        assert_eq!(
            store.counts(),
            StoreCounts {
                evidence: 2,
                pathways: 1,
                insights: 1
            }
        );
    }

    #[test]
    fn duplicate_evidence_is_rejected() {
        let mut store = populated();
        let err = store.add_evidence(card("aec_1", AgentRole::Critic)).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentifier(id) if id == "aec_1"));
        assert_eq!(store.get_evidence("aec_1").unwrap().role, AgentRole::Planner);
    }

    #[test]
    fn dangling_pathway_leaves_store_unchanged() {
        let mut store = populated();
        let before = store.counts();

        let err = store
            .add_pathway(PolicyPathway::new(vec!["aec_1".into(), "aec_missing".into()]))
            .unwrap_err();

        assert!(matches!(err, Error::DanglingReference(_)));
        assert_eq!(store.counts(), before);
    }

    #[test]
    fn pathway_with_unresolved_link_is_rejected() {
        let mut store = populated();
        let mut pathway = PolicyPathway::new(vec!["aec_1".into()]);
        pathway.linked_insight_id = Some("insight_1".into());

        let err = store.add_pathway(pathway).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
    }

    #[test]
    fn insight_for_missing_pathway_is_rejected() {
        let mut store = populated();
        let err = store.add_insight(Insight::new("orphan", "pp_missing")).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
        assert_eq!(store.counts().insights, 1);
    }

    #[test]
    fn second_insight_for_pathway_is_rejected() {
        let mut store = populated();
        let err = store.add_insight(Insight::new("again", "pp_1")).unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyLinked { ref pathway_id, ref insight_id }
                if pathway_id == "pp_1" && insight_id == "insight_1"
        ));
        assert_eq!(store.counts().insights, 1);
    }

    #[test]
    fn lookups_of_missing_ids_fail() {
        let store = populated();
        assert!(matches!(store.get_evidence("nope"), Err(Error::NotFound(_))));
        assert!(matches!(store.get_pathway("nope"), Err(Error::NotFound(_))));
        assert!(matches!(store.get_insight("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn evidence_for_pathway_follows_execution_order() {
        let mut store = populated();
        store
            .add_pathway(PolicyPathway::new(vec!["aec_2".into(), "aec_1".into()]).with_id("pp_2"))
            .unwrap();

        let ids: Vec<_> = store
            .evidence_for_pathway("pp_2")
            .unwrap()
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["aec_2", "aec_1"]);
    }

    #[test]
    fn snapshot_round_trip_preserves_order_and_links() {
        let mut store = populated();
        store.add_evidence(card("aec_0", AgentRole::Critic)).unwrap();
        store
            .add_pathway(PolicyPathway::new(vec!["aec_0".into()]).with_id("pp_0"))
            .unwrap();

        let snapshot = store.to_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let reloaded = MemoryStore::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(reloaded.to_snapshot(), snapshot);
        let order: Vec<_> = reloaded.all_evidence().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["aec_1", "aec_2", "aec_0"]);
        assert!(reloaded.get_pathway("pp_0").unwrap().linked_insight_id.is_none());
        assert_eq!(
            reloaded.get_pathway("pp_1").unwrap().linked_insight_id.as_deref(),
            Some("insight_1")
        );
    }

    #[test]
    fn snapshot_with_mismatched_key_is_rejected() {
        let mut snapshot = populated().to_snapshot();
        let card = snapshot.evidence.shift_remove("aec_1").unwrap();
        snapshot.evidence.insert("aec_other".into(), card);

        let err = MemoryStore::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }

    #[test]
    fn rollback_drops_later_entities_and_their_links() {
        let mut store = populated();
        store.add_evidence(card("aec_3", AgentRole::Critic)).unwrap();
        store
            .add_pathway(PolicyPathway::new(vec!["aec_3".into()]).with_id("pp_2"))
            .unwrap();
        let before = store.to_snapshot();
        let checkpoint = store.checkpoint();

        store
            .add_insight(Insight::new("late insight", "pp_2").with_id("insight_2"))
            .unwrap();
        store.add_evidence(card("aec_4", AgentRole::Planner)).unwrap();
        store
            .add_pathway(PolicyPathway::new(vec!["aec_4".into()]).with_id("pp_3"))
            .unwrap();

        store.rollback(checkpoint);

        assert_eq!(store.to_snapshot(), before);
        assert!(store.get_pathway("pp_2").unwrap().linked_insight_id.is_none());
        assert_eq!(
            store.get_pathway("pp_1").unwrap().linked_insight_id.as_deref(),
            Some("insight_1")
        );
    }

    #[test]
    fn rollback_to_current_checkpoint_is_a_no_op() {
        let mut store = populated();
        let before = store.to_snapshot();
        let checkpoint = store.checkpoint();
        store.rollback(checkpoint);
        assert_eq!(store.to_snapshot(), before);
    }

    #[test]
    fn snapshot_with_inconsistent_link_is_rejected() {
        let mut snapshot = populated().to_snapshot();
        snapshot.pathways["pp_1"].linked_insight_id = None;

        let err = MemoryStore::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
    }
}
