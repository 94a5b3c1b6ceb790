//! Role-specific prompt scaffolds built from co-retrieved experience

use std::collections::BTreeMap;

use crate::entity::{Insight, PolicyPathway};
use crate::error::Result;
use crate::hdpm::CoRetrieval;
use crate::memory::MemoryStore;
use crate::trajectory::AgentRole;

const GUIDANCE: &str = "apply this successful strategy";
const WARNING: &str = "avoid this known failure mode";

/// Renders the Planner, Assistant and Critic scaffolds
pub(crate) struct ScaffoldBuilder<'a> {
    pub positive: &'a MemoryStore,
    pub negative: &'a MemoryStore,
    pub max_evidence: usize,
}

impl ScaffoldBuilder<'_> {
    pub fn build_all(
        &self,
        query: &str,
        retrieved: &CoRetrieval,
    ) -> Result<BTreeMap<AgentRole, String>> {
        let mut prompts = BTreeMap::new();
        for role in AgentRole::ALL {
            let prompt = match role {
                AgentRole::Planner => self.planner(query, retrieved)?,
                AgentRole::Assistant => self.assistant(query, retrieved)?,
                AgentRole::Critic => self.critic(query, retrieved)?,
            };
            prompts.insert(role, prompt);
        }
        Ok(prompts)
    }

    /// Strategy-level briefing: insights plus the plan steps that produced them
    fn planner(&self, query: &str, retrieved: &CoRetrieval) -> Result<String> {
        let mut out = header("Planner Strategic Briefing", query);

        let sections = [
            (
                "Success Principles",
                GUIDANCE,
                self.positive,
                &retrieved.positive_insights,
                &retrieved.positive_pathways,
            ),
            (
                "Failure Traps",
                WARNING,
                self.negative,
                &retrieved.negative_insights,
                &retrieved.negative_pathways,
            ),
        ];

        for (title, framing, store, insights, pathways) in sections {
            if insights.is_empty() {
                continue;
            }
            out.push_str(&format!("\n# {} ({}):\n", title, framing));
            for (insight, pathway) in insights.iter().zip(pathways.iter()) {
                out.push_str(&format!("- {}\n", insight.content));
                let plan: Vec<String> = store
                    .evidence_for_pathway(&pathway.id)?
                    .into_iter()
                    .filter(|card| card.role == AgentRole::Planner)
                    .take(self.max_evidence)
                    .map(|card| card.content.clone())
                    .collect();
                if plan.is_empty() {
                    out.push_str(&format!(
                        "  Pathway {}: {} steps\n",
                        pathway.id,
                        pathway.len()
                    ));
                } else {
                    out.push_str(&format!(
                        "  Pathway {} ({} steps) strategy: {}\n",
                        pathway.id,
                        pathway.len(),
                        plan.join(" -> ")
                    ));
                }
            }
        }

        out.push_str("\nFormulate a high-level strategic plan for the task above.\n");
        Ok(out)
    }

    /// Execution handbook: concrete tool usage from past Assistant steps
    fn assistant(&self, query: &str, retrieved: &CoRetrieval) -> Result<String> {
        let mut out = header("Assistant Execution Handbook", query);

        self.evidence_section(
            &mut out,
            "Successful Tool Usage",
            GUIDANCE,
            self.positive,
            &retrieved.positive_insights,
            &retrieved.positive_pathways,
            AgentRole::Assistant,
        )?;
        self.evidence_section(
            &mut out,
            "Failed Tool Usage",
            WARNING,
            self.negative,
            &retrieved.negative_insights,
            &retrieved.negative_pathways,
            AgentRole::Assistant,
        )?;

        out.push_str(
            "\nReplicate successful tool usage and parameters; never repeat a known failure.\n",
        );
        Ok(out)
    }

    /// Evaluation essentials: failure signatures first, then success indicators
    fn critic(&self, query: &str, retrieved: &CoRetrieval) -> Result<String> {
        let mut out = header("Critic Evaluation Essentials", query);

        self.evidence_section(
            &mut out,
            "Failure Signatures from Past Evaluations",
            WARNING,
            self.negative,
            &retrieved.negative_insights,
            &retrieved.negative_pathways,
            AgentRole::Critic,
        )?;
        self.evidence_section(
            &mut out,
            "Indicators from Successful Evaluations",
            GUIDANCE,
            self.positive,
            &retrieved.positive_insights,
            &retrieved.positive_pathways,
            AgentRole::Critic,
        )?;

        out.push_str("\nEvaluate the result for the task above and flag any sign of a previously observed failure.\n");
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn evidence_section(
        &self,
        out: &mut String,
        title: &str,
        framing: &str,
        store: &MemoryStore,
        insights: &[Insight],
        pathways: &[PolicyPathway],
        role: AgentRole,
    ) -> Result<()> {
        if insights.is_empty() {
            return Ok(());
        }

        out.push_str(&format!("\n# {} ({}):\n", title, framing));
        let mut quoted = 0;
        for (insight, pathway) in insights.iter().zip(pathways.iter()) {
            out.push_str(&format!("- {}\n", insight.content));
            for card in store.evidence_for_pathway(&pathway.id)? {
                if quoted >= self.max_evidence {
                    break;
                }
                if card.role == role {
                    out.push_str(&format!(
                        "  - {} ({})\n",
                        card.content,
                        card.timestamp.format("%Y-%m-%d %H:%M")
                    ));
                    quoted += 1;
                }
            }
        }
        Ok(())
    }
}

fn header(title: &str, query: &str) -> String {
    format!("### {} ###\nTask: \"{}\"\n", title, query)
}
