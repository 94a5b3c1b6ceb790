//! # HDPM Memory
//!
//! Hierarchical dual-pathway experience memory for multi-agent task execution.
//!
//! ## Architecture
//!
//! Every completed task is filed as a three-tier hierarchy:
//! - **Evidence** - one [`AtomicEvidenceCard`] per trajectory step
//! - **Pathway** - the ordered [`PolicyPathway`] of a task's evidence
//! - **Insight** - the distilled principle or trap, linked to its pathway
//!
//! Successful tasks go to the positive store, failed tasks to the negative
//! store. Before a new task both stores are searched and the results are
//! rendered into one prompt per agent role (Planner, Assistant, Critic).
//!
//! ## Usage
//!
//! ```rust
//! use hdpm_memory::{AgentRole, Hdpm, ReflectAgent, TrajectoryStep};
//!
//! let mut hdpm = Hdpm::new();
//! let agent = ReflectAgent::default();
//!
//! let trajectory = vec![
//!     TrajectoryStep::new(AgentRole::Planner, "Fold protein Alpha with SuperFold."),
//!     TrajectoryStep::new(AgentRole::Assistant, "Used SuperFold with temp=300."),
//!     TrajectoryStep::new(AgentRole::Critic, "Excellent geometry. Success!"),
//! ];
//! agent.update_memory(&trajectory, 1, &mut hdpm)?;
//!
//! let prompts = hdpm.generate_role_specific_prompts("fold protein Alpha", 1)?;
//! assert!(prompts[&AgentRole::Planner].contains("Success Principle"));
//! # Ok::<(), hdpm_memory::Error>(())
//! ```

pub mod config;
pub mod distill;
#[cfg(feature = "embeddings")]
pub mod embedding;
pub mod entity;
pub mod error;
pub mod hdpm;
pub mod memory;
mod prompt;
pub mod reflect;
pub mod retrieval;
pub mod scoring;
pub mod storage;
pub mod trajectory;

pub use config::{Config, StorageBackend};
pub use distill::{Distiller, KeywordDistiller};
#[cfg(feature = "embeddings")]
pub use embedding::EmbeddingScorer;
pub use entity::{AtomicEvidenceCard, Insight, PolicyPathway};
pub use error::{Error, Result};
pub use hdpm::{CoRetrieval, Hdpm, HdpmSnapshot, HdpmStats, SharedHdpm};
pub use memory::{MemoryStore, StoreCheckpoint, StoreCounts, StoreSnapshot};
pub use reflect::{ReflectAgent, Reflection};
pub use retrieval::{RetrievalEngine, RetrievedExperience};
pub use scoring::{KeywordOverlapScorer, RelevanceScorer};
pub use trajectory::{AgentRole, TrajectoryStep, Valence};
