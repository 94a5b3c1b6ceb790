//! Trajectory types produced by the agent team

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Role of the agent that produced a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    Planner,
    Assistant,
    Critic,
}

impl AgentRole {
    /// Every role that receives a synthesized prompt, in prompt order
    pub const ALL: [AgentRole; 3] = [AgentRole::Planner, AgentRole::Assistant, AgentRole::Critic];
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Planner => write!(f, "Planner"),
            AgentRole::Assistant => write!(f, "Assistant"),
            AgentRole::Critic => write!(f, "Critic"),
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "planner" => Ok(AgentRole::Planner),
            "assistant" => Ok(AgentRole::Assistant),
            "critic" => Ok(AgentRole::Critic),
            _ => Err(Error::config(format!("Unknown agent role: {}", s))),
        }
    }
}

/// Which store an experience belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valence {
    Positive,
    Negative,
}

impl Valence {
    /// Map a signed task outcome to a valence. Zero has no valence.
    pub fn from_outcome(outcome: i32) -> Result<Self> {
        match outcome.signum() {
            1 => Ok(Valence::Positive),
            -1 => Ok(Valence::Negative),
            _ => Err(Error::InvalidOutcome(outcome)),
        }
    }
}

impl std::fmt::Display for Valence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Valence::Positive => write!(f, "positive"),
            Valence::Negative => write!(f, "negative"),
        }
    }
}

/// A single step of a completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    /// Role of the agent that took the step
    pub role: AgentRole,

    /// What the agent did or observed
    pub content: String,

    /// When the step happened
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TrajectoryStep {
    /// Create a new step stamped with the current time
    pub fn new(role: AgentRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Set the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
