//! Reviewer agent: critiques the current plan at the configured strictness.

use tracing::{debug, info, instrument, warn};

use crate::core::coerce::{Coerced, coerce};
use crate::core::types::{Feedback, SharedState, StateUpdate};
use crate::io::generation::GenerationClient;
use crate::io::prompt::reviewer_prompt;

use super::failure_text;

#[derive(Debug, Clone, Default)]
pub struct ReviewerAgent {
    /// `has_issues` recorded when no review could be obtained.
    failed_review_has_issues: bool,
}

impl ReviewerAgent {
    pub fn new(failed_review_has_issues: bool) -> Self {
        Self {
            failed_review_has_issues,
        }
    }

    /// Produce `{review_feedback}` for `state`. Never fails.
    #[instrument(skip_all, fields(turn = state.turn_count, strict = state.strict_mode))]
    pub fn run<C: GenerationClient + ?Sized>(&self, client: &C, state: &SharedState) -> StateUpdate {
        StateUpdate::review(self.review(client, state))
    }

    fn review<C: GenerationClient + ?Sized>(&self, client: &C, state: &SharedState) -> Feedback {
        let prompt = match reviewer_prompt(state) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "reviewer prompt failed");
                return self.failed(format!("{err:#}"));
            }
        };

        let raw = match client.generate(&state.model_id, &prompt) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(err = %err, "reviewer generation failed");
                return self.failed(err);
            }
        };

        // Prose replies never claim issues, whatever the failure policy says.
        let coerced = coerce::<Feedback>(&raw);
        if let Coerced::Fallback { reason, .. } = &coerced {
            debug!(%reason, "reviewer reply kept as prose");
        }
        let feedback = coerced.into_record();
        info!(
            has_issues = feedback.has_issues,
            suggestions = feedback.suggestions.len(),
            "reviewer produced feedback"
        );
        feedback
    }

    fn failed(&self, err: impl std::fmt::Display) -> Feedback {
        Feedback::degraded(failure_text(err), self.failed_review_has_issues)
    }
}
