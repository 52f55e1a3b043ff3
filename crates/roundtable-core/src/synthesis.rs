//! Round synthesis
//!
//! Turns the per-agent contributions of a round into one document. The
//! default synthesizer is deterministic and purely structural; when it
//! fails the orchestrator falls back to plain concatenation so a round is
//! never lost.

use crate::error::{Error, Result};
use crate::persona::AgentContribution;

/// Produces the synthesized document for one round.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one round from the original request, the round's
    /// contributions and the feedback that drove it (absent for round 0).
    async fn synthesize(
        &self,
        request: &str,
        contributions: &[AgentContribution],
        round_index: usize,
        feedback: Option<&str>,
    ) -> Result<String>;
}

/// Deterministic sectioned synthesizer.
///
/// Layout: overview, one section per specialist, convergence notes, next
/// steps. No model call is involved, so synthesis works even when every
/// contribution is degraded.
#[derive(Debug, Default)]
pub struct StructuredSynthesizer;

impl StructuredSynthesizer {
    /// Create the synthesizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Synthesizer for StructuredSynthesizer {
    async fn synthesize(
        &self,
        request: &str,
        contributions: &[AgentContribution],
        round_index: usize,
        feedback: Option<&str>,
    ) -> Result<String> {
        if contributions.is_empty() {
            return Err(Error::SynthesisFailure(
                "round has no contributions".to_string(),
            ));
        }

        let degraded: Vec<&str> = contributions
            .iter()
            .filter(|c| c.degraded)
            .map(|c| c.display_name.as_str())
            .collect();

        let mut doc = String::new();
        doc.push_str("# Team Analysis\n\n");
        doc.push_str("## Overview\n\n");
        doc.push_str(&format!(
            "Round {} response from {} specialists to the request:\n\n> {}\n\n",
            round_index,
            contributions.len(),
            request.trim()
        ));
        if let Some(feedback) = feedback {
            doc.push_str(&format!(
                "This round refines the prior answer based on the feedback:\n\n> {}\n\n",
                feedback.trim()
            ));
        }

        doc.push_str("## Specialist Contributions\n\n");
        for contribution in contributions {
            doc.push_str(&format!("### {}\n\n", contribution.display_name));
            if contribution.degraded {
                doc.push_str("*(offline placeholder; provider unreachable)*\n\n");
            }
            doc.push_str(contribution.content.trim());
            doc.push_str("\n\n");
        }

        doc.push_str("## Convergence\n\n");
        let live = contributions.len() - degraded.len();
        doc.push_str(&format!(
            "{} of {} specialists contributed live analysis this round.\n",
            live,
            contributions.len()
        ));
        if degraded.is_empty() {
            doc.push_str("All perspectives above reflect current model output.\n\n");
        } else {
            doc.push_str(&format!(
                "Offline placeholders were used for: {}.\n\n",
                degraded.join(", ")
            ));
        }

        doc.push_str("## Next Steps\n\n");
        if round_index == 0 {
            doc.push_str(
                "Review the specialist positions above and iterate with feedback \
                 on the areas that need deeper treatment.\n",
            );
        } else {
            doc.push_str(
                "Compare this round against the prior synthesis and iterate again \
                 if the feedback is not yet fully addressed.\n",
            );
        }

        Ok(doc)
    }
}

/// Fallback used when structured synthesis fails: raw contributions joined
/// with headers, nothing dropped.
#[must_use]
pub fn concatenate(contributions: &[AgentContribution]) -> String {
    contributions
        .iter()
        .map(|c| format!("[{}]\n{}", c.display_name, c.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
