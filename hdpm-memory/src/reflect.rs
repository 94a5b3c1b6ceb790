//! Post-task reflection: turning a trajectory into filed experience

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::distill::{Distiller, KeywordDistiller};
use crate::entity::{AtomicEvidenceCard, Insight, PolicyPathway};
use crate::error::{Error, Result};
use crate::hdpm::Hdpm;
use crate::memory::MemoryStore;
use crate::trajectory::{TrajectoryStep, Valence};

/// What one reflection filed into memory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reflection {
    /// Which store received the experience
    pub valence: Valence,

    /// The distilled insight, if the distiller produced one
    pub insight: Option<Insight>,

    /// The pathway as stored, including its insight link
    pub pathway: PolicyPathway,

    /// Evidence cards in trajectory order
    pub evidence: Vec<AtomicEvidenceCard>,
}

/// Processes completed trajectories into the memory hierarchy
#[derive(Clone)]
pub struct ReflectAgent {
    distiller: Arc<dyn Distiller>,
}

impl Default for ReflectAgent {
    fn default() -> Self {
        Self::new(Arc::new(KeywordDistiller::default()))
    }
}

impl ReflectAgent {
    pub fn new(distiller: Arc<dyn Distiller>) -> Self {
        Self { distiller }
    }

    /// Create an agent using the keyword distiller with configured limits
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(KeywordDistiller::from_config(config)))
    }

    /// One evidence card per step, in step order
    pub fn atomize(&self, trajectory: &[TrajectoryStep]) -> Vec<AtomicEvidenceCard> {
        trajectory.iter().map(AtomicEvidenceCard::from).collect()
    }

    /// A pathway referencing `cards` in the given order
    pub fn serialize(&self, cards: &[AtomicEvidenceCard]) -> PolicyPathway {
        PolicyPathway::new(cards.iter().map(|card| card.id.clone()).collect())
    }

    /// File a completed trajectory into the store matching `outcome`'s sign
    ///
    /// A filing error aborts with [`Error::FilingFailed`]; entities filed
    /// before the failure stay in the store. Use
    /// [`update_memory_atomic`](Self::update_memory_atomic) when that matters.
    pub fn update_memory(
        &self,
        trajectory: &[TrajectoryStep],
        outcome: i32,
        hdpm: &mut Hdpm,
    ) -> Result<Reflection> {
        let valence = validate(trajectory, outcome)?;
        let evidence = self.atomize(trajectory);
        self.file(trajectory, evidence, valence, hdpm.store_mut(valence))
    }

    /// Like [`update_memory`](Self::update_memory), but nothing is kept on failure
    pub fn update_memory_atomic(
        &self,
        trajectory: &[TrajectoryStep],
        outcome: i32,
        hdpm: &mut Hdpm,
    ) -> Result<Reflection> {
        self.update_memory_and_persist(trajectory, outcome, hdpm, |_| Ok(()))
    }

    /// File atomically, then hand the updated memory to `persist`
    ///
    /// If `persist` fails the filing is rolled back and its error returned,
    /// so memory only ever holds what was persisted.
    pub fn update_memory_and_persist<F>(
        &self,
        trajectory: &[TrajectoryStep],
        outcome: i32,
        hdpm: &mut Hdpm,
        persist: F,
    ) -> Result<Reflection>
    where
        F: FnOnce(&Hdpm) -> Result<()>,
    {
        let valence = validate(trajectory, outcome)?;
        let evidence = self.atomize(trajectory);
        self.file_and_persist(trajectory, evidence, valence, hdpm, persist)
    }

    fn file_and_persist<F>(
        &self,
        trajectory: &[TrajectoryStep],
        evidence: Vec<AtomicEvidenceCard>,
        valence: Valence,
        hdpm: &mut Hdpm,
        persist: F,
    ) -> Result<Reflection>
    where
        F: FnOnce(&Hdpm) -> Result<()>,
    {
        let checkpoint = hdpm.store(valence).checkpoint();
        let result = self
            .file(trajectory, evidence, valence, hdpm.store_mut(valence))
            .and_then(|reflection| persist(&*hdpm).map(|()| reflection));

        if let Err(e) = &result {
            hdpm.store_mut(valence).rollback(checkpoint);
            warn!(%valence, error = %e, "Filing rolled back");
        }
        result
    }

    fn file(
        &self,
        trajectory: &[TrajectoryStep],
        evidence: Vec<AtomicEvidenceCard>,
        valence: Valence,
        store: &mut MemoryStore,
    ) -> Result<Reflection> {
        for card in &evidence {
            store
                .add_evidence(card.clone())
                .map_err(Error::filing_failed)?;
        }

        let pathway_id = store
            .add_pathway(self.serialize(&evidence))
            .map_err(Error::filing_failed)?;

        let insight = match self.distiller.distill(trajectory, valence) {
            Some(content) => {
                let insight = Insight::new(content, &pathway_id);
                store
                    .add_insight(insight.clone())
                    .map_err(Error::filing_failed)?;
                Some(insight)
            }
            None => {
                warn!(
                    pathway_id = %pathway_id,
                    steps = trajectory.len(),
                    "Distillation produced no insight; pathway stays unlinked"
                );
                None
            }
        };

        let pathway = store.get_pathway(&pathway_id)?.clone();

        info!(
            %valence,
            pathway_id = %pathway.id,
            insight_id = insight.as_ref().map(|i| i.id.as_str()).unwrap_or("-"),
            evidence = evidence.len(),
            "Filed experience"
        );

        Ok(Reflection {
            valence,
            insight,
            pathway,
            evidence,
        })
    }
}

fn validate(trajectory: &[TrajectoryStep], outcome: i32) -> Result<Valence> {
    if trajectory.is_empty() {
        return Err(Error::EmptyTrajectory);
    }
    Valence::from_outcome(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::AgentRole;
    use chrono::{TimeZone, Utc};

    struct SilentDistiller;

    impl Distiller for SilentDistiller {
        fn distill(&self, _trajectory: &[TrajectoryStep], _valence: Valence) -> Option<String> {
            None
        }
    }

    fn successful() -> Vec<TrajectoryStep> {
        let ts = |m| Utc.with_ymd_and_hms(2023, 1, 1, 10, m, 0).unwrap();
        vec![
            TrajectoryStep::new(AgentRole::Planner, "Plan successful: Use ToolX for protein success.").at(ts(0)),
            TrajectoryStep::new(AgentRole::Assistant, "Assistant: ToolX ran with success.").at(ts(5)),
            TrajectoryStep::new(AgentRole::Critic, "Critic: Outcome is a success.").at(ts(10)),
        ]
    }

    fn failed() -> Vec<TrajectoryStep> {
        vec![
            TrajectoryStep::new(AgentRole::Planner, "Plan failed: Use ToolY."),
            TrajectoryStep::new(AgentRole::Assistant, "Assistant: ToolY execution error."),
            TrajectoryStep::new(AgentRole::Critic, "Critic: Task failed due to error."),
        ]
    }

    #[test]
    fn atomize_keeps_step_order_and_fields() {
        let trajectory = successful();
        let cards = ReflectAgent::default().atomize(&trajectory);

        assert_eq!(cards.len(), 3);
        for (card, step) in cards.iter().zip(&trajectory) {
            assert_eq!(card.role, step.role);
            assert_eq!(card.content, step.content);
            assert_eq!(card.timestamp, step.timestamp);
        }
    }

    #[test]
    fn serialize_references_cards_in_order() {
        let agent = ReflectAgent::default();
        let cards = agent.atomize(&successful());
        let pathway = agent.serialize(&cards);
        let expected: Vec<_> = cards.iter().map(|c| c.id.clone()).collect();
        assert_eq!(pathway.evidence_card_ids, expected);
    }

    #[test]
    fn success_is_filed_in_positive_store() {
        let mut hdpm = Hdpm::new();
        let reflection = ReflectAgent::default()
            .update_memory(&successful(), 1, &mut hdpm)
            .unwrap();

        let insight = reflection.insight.expect("insight");
        assert!(insight.content.starts_with("Success Principle:"));
        assert_eq!(reflection.valence, Valence::Positive);
        assert_eq!(reflection.evidence.len(), 3);
        assert_eq!(reflection.pathway.linked_insight_id.as_deref(), Some(insight.id.as_str()));

        let store = hdpm.positive();
        assert_eq!(store.get_insight(&insight.id).unwrap(), &insight);
        let stored: Vec<_> = store.all_evidence().map(|c| c.id.clone()).collect();
        let returned: Vec<_> = reflection.evidence.iter().map(|c| c.id.clone()).collect();
        assert_eq!(stored, returned);
        assert!(hdpm.negative().is_empty());
    }

    #[test]
    fn failure_is_filed_in_negative_store() {
        let mut hdpm = Hdpm::new();
        let reflection = ReflectAgent::default()
            .update_memory(&failed(), -1, &mut hdpm)
            .unwrap();

        let insight = reflection.insight.expect("insight");
        assert!(insight.content.starts_with("Failure Trap:"));
        assert_eq!(hdpm.negative().counts().evidence, 3);
        assert_eq!(hdpm.negative().counts().insights, 1);
        assert!(hdpm.positive().is_empty());
    }

    #[test]
    fn empty_trajectory_files_nothing() {
        let mut hdpm = Hdpm::new();
        let err = ReflectAgent::default()
            .update_memory(&[], 1, &mut hdpm)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyTrajectory));
        assert!(hdpm.positive().is_empty());
    }

    #[test]
    fn zero_outcome_is_rejected() {
        let mut hdpm = Hdpm::new();
        let err = ReflectAgent::default()
            .update_memory(&successful(), 0, &mut hdpm)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOutcome(0)));
        assert!(hdpm.positive().is_empty());
        assert!(hdpm.negative().is_empty());
    }

    #[test]
    fn missing_insight_keeps_evidence_and_pathway() {
        let mut hdpm = Hdpm::new();
        let reflection = ReflectAgent::new(Arc::new(SilentDistiller))
            .update_memory(&successful(), 1, &mut hdpm)
            .unwrap();

        assert!(reflection.insight.is_none());
        assert!(reflection.pathway.linked_insight_id.is_none());
        let counts = hdpm.positive().counts();
        assert_eq!((counts.evidence, counts.pathways, counts.insights), (3, 1, 0));
    }

    fn seeded_with(card_id: &str) -> Hdpm {
        let mut hdpm = Hdpm::new();
        hdpm.store_mut(Valence::Positive)
            .add_evidence(AtomicEvidenceCard::new(AgentRole::Planner, "seed", Utc::now()).with_id(card_id))
            .unwrap();
        hdpm
    }

    fn colliding_cards(agent: &ReflectAgent, trajectory: &[TrajectoryStep]) -> Vec<AtomicEvidenceCard> {
        let mut cards = agent.atomize(trajectory);
        cards[1].id = "aec_taken".into();
        cards
    }

    fn assert_duplicate_card(err: Error) {
        match err {
            Error::FilingFailed(inner) => assert!(
                matches!(*inner, Error::DuplicateIdentifier(ref id) if id == "aec_taken")
            ),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn colliding_card_fails_and_keeps_earlier_entities() {
        let mut hdpm = seeded_with("aec_taken");
        let agent = ReflectAgent::default();
        let trajectory = successful();
        let cards = colliding_cards(&agent, &trajectory);

        let err = agent
            .file(&trajectory, cards, Valence::Positive, hdpm.store_mut(Valence::Positive))
            .unwrap_err();

        assert_duplicate_card(err);
        let counts = hdpm.positive().counts();
        assert_eq!((counts.evidence, counts.pathways, counts.insights), (2, 0, 0));
    }

    #[test]
    fn atomic_filing_rolls_back_on_collision() {
        let mut hdpm = seeded_with("aec_taken");
        let before = hdpm.to_snapshot();
        let agent = ReflectAgent::default();
        let trajectory = successful();
        let cards = colliding_cards(&agent, &trajectory);

        let err = agent
            .file_and_persist(&trajectory, cards, Valence::Positive, &mut hdpm, |_| Ok(()))
            .unwrap_err();

        assert_duplicate_card(err);
        assert_eq!(hdpm.to_snapshot(), before);
    }

    #[test]
    fn failed_persist_rolls_back_filing() {
        let mut hdpm = Hdpm::new();
        let agent = ReflectAgent::default();
        agent.update_memory(&failed(), -1, &mut hdpm).unwrap();
        let before = hdpm.to_snapshot();

        let err = agent
            .update_memory_and_persist(&failed(), -1, &mut hdpm, |filed| {
                assert_eq!(filed.negative().counts().insights, 2);
                Err(Error::storage("disk full"))
            })
            .unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(hdpm.to_snapshot(), before);
        let pathway_id = &hdpm.negative().all_pathways().next().unwrap().id;
        assert!(hdpm.negative().get_pathway(pathway_id).unwrap().linked_insight_id.is_some());
    }

    #[test]
    fn successful_persist_sees_the_filed_experience() {
        let mut hdpm = Hdpm::new();
        let mut persisted = None;
        let reflection = ReflectAgent::default()
            .update_memory_and_persist(&successful(), 1, &mut hdpm, |filed| {
                persisted = Some(filed.to_snapshot());
                Ok(())
            })
            .unwrap();

        assert_eq!(persisted, Some(hdpm.to_snapshot()));
        assert!(hdpm.positive().get_pathway(&reflection.pathway.id).is_ok());
    }

    #[test]
    fn same_trajectory_twice_is_filed_twice() {
        let mut hdpm = Hdpm::new();
        let agent = ReflectAgent::default();
        agent.update_memory(&failed(), -1, &mut hdpm).unwrap();
        agent.update_memory_atomic(&failed(), -1, &mut hdpm).unwrap();

        let counts = hdpm.negative().counts();
        assert_eq!((counts.evidence, counts.pathways, counts.insights), (6, 2, 2));
    }
}
