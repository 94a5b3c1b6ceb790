//! The three tiers of the memory hierarchy: evidence, pathways and insights
//!
//! Entities refer to each other by identifier only. The owning
//! [`MemoryStore`](crate::memory::MemoryStore) resolves the references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trajectory::{AgentRole, TrajectoryStep};

/// One granular event extracted from a trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicEvidenceCard {
    /// Unique card ID (`aec_<uuid>`)
    pub id: String,

    /// What happened
    pub content: String,

    /// Role of the agent that produced the event
    pub role: AgentRole,

    /// When the event happened
    pub timestamp: DateTime<Utc>,
}

impl AtomicEvidenceCard {
    /// Create a new card with a fresh ID
    pub fn new(role: AgentRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: format!("aec_{}", Uuid::new_v4()),
            content: content.into(),
            role,
            timestamp,
        }
    }

    /// Override the generated ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl From<&TrajectoryStep> for AtomicEvidenceCard {
    fn from(step: &TrajectoryStep) -> Self {
        Self::new(step.role, step.content.clone(), step.timestamp)
    }
}

/// The ordered record of one task's execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyPathway {
    /// Unique pathway ID (`pp_<uuid>`)
    pub id: String,

    /// Evidence card IDs in execution order
    pub evidence_card_ids: Vec<String>,

    /// Insight distilled from this pathway, once there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_insight_id: Option<String>,
}

impl PolicyPathway {
    /// Create a new unlinked pathway with a fresh ID
    pub fn new(evidence_card_ids: Vec<String>) -> Self {
        Self {
            id: format!("pp_{}", Uuid::new_v4()),
            evidence_card_ids,
            linked_insight_id: None,
        }
    }

    /// Override the generated ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn len(&self) -> usize {
        self.evidence_card_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evidence_card_ids.is_empty()
    }
}

/// A distilled success principle or failure trap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Unique insight ID (`insight_<uuid>`)
    pub id: String,

    /// The principle itself
    pub content: String,

    /// Pathway this insight was distilled from
    pub source_pathway_id: String,
}

impl Insight {
    /// Create a new insight with a fresh ID
    pub fn new(content: impl Into<String>, source_pathway_id: impl Into<String>) -> Self {
        Self {
            id: format!("insight_{}", Uuid::new_v4()),
            content: content.into(),
            source_pathway_id: source_pathway_id.into(),
        }
    }

    /// Override the generated ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}
