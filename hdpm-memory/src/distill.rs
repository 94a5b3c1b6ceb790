//! Distillation of a trajectory into a one-sentence insight

use crate::trajectory::{AgentRole, TrajectoryStep, Valence};

/// Turns a completed trajectory into insight text
///
/// Returning `None` signals that the trajectory does not warrant an insight.
/// Implementations must not depend on hidden mutable state.
pub trait Distiller: Send + Sync {
    fn distill(&self, trajectory: &[TrajectoryStep], valence: Valence) -> Option<String>;
}

const SUCCESS_MARKERS: [&str; 3] = ["success", "good", "resolved"];
const FAILURE_MARKERS: [&str; 3] = ["fail", "error", "issue"];
const FEEDBACK_MARKERS: [&str; 3] = ["warning", "problem", "bad"];

/// Deterministic keyword heuristic standing in for a language model
#[derive(Debug, Clone)]
pub struct KeywordDistiller {
    max_chars: usize,
    min_steps: usize,
}

impl Default for KeywordDistiller {
    fn default() -> Self {
        Self {
            max_chars: 300,
            min_steps: 1,
        }
    }
}

impl KeywordDistiller {
    pub fn new(max_chars: usize, min_steps: usize) -> Self {
        Self {
            max_chars,
            min_steps,
        }
    }

    /// Build a distiller from the configured limits
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.max_insight_chars, config.min_trajectory_steps)
    }
}

impl Distiller for KeywordDistiller {
    fn distill(&self, trajectory: &[TrajectoryStep], valence: Valence) -> Option<String> {
        if trajectory.len() < self.min_steps.max(1)
            || trajectory.iter().all(|s| s.content.trim().is_empty())
        {
            return None;
        }

        let mut text = String::from(match valence {
            Valence::Positive => "Success Principle: ",
            Valence::Negative => "Failure Trap: ",
        });

        if let Some(plan) = trajectory.iter().find(|s| s.role == AgentRole::Planner) {
            text.push_str(&format!("Context: {}. ", plan.content.trim()));
        }
        let base_len = text.len();

        let markers = match valence {
            Valence::Positive => &SUCCESS_MARKERS,
            Valence::Negative => &FAILURE_MARKERS,
        };
        if let Some(step) = first_mentioning(trajectory, markers) {
            let label = match valence {
                Valence::Positive => "Key success factors",
                Valence::Negative => "Key failure points",
            };
            text.push_str(&format!("{}: {}. ", label, step.content.trim()));
        }

        if let Some(tool) = trajectory.iter().find_map(tool_of_note) {
            text.push_str(&format!("Tools of note: {}. ", tool));
        }

        if valence == Valence::Negative {
            let feedback = trajectory
                .iter()
                .filter(|s| s.role == AgentRole::Critic)
                .find(|s| mentions_any(&s.content, &FEEDBACK_MARKERS));
            if let Some(step) = feedback {
                text.push_str(&format!("Critical feedback: {}. ", step.content.trim()));
            }
        }

        if text.len() == base_len {
            let first: String = trajectory[0].content.trim().chars().take(50).collect();
            text.push_str(&format!(
                "General observation over {} steps. First step: {}",
                trajectory.len(),
                first
            ));
        }

        Some(truncate_chars(text.trim_end(), self.max_chars))
    }
}

fn mentions_any(content: &str, markers: &[&str]) -> bool {
    let lower = content.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

fn first_mentioning<'a>(
    trajectory: &'a [TrajectoryStep],
    markers: &[&str],
) -> Option<&'a TrajectoryStep> {
    trajectory.iter().find(|s| mentions_any(&s.content, markers))
}

/// "Used ToolX with ..." -> "ToolX"
fn tool_of_note(step: &TrajectoryStep) -> Option<String> {
    if step.role != AgentRole::Assistant {
        return None;
    }
    let mut words = step.content.split_whitespace();
    let verb = words.next()?.to_lowercase();
    if verb.contains("used") || verb.contains("tool") {
        words
            .next()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
    } else {
        None
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
