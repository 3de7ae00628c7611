//! Planner agent: drafts a plan, or revises it against the latest review.

use tracing::{debug, info, instrument, warn};

use crate::core::coerce::{Coerced, coerce};
use crate::core::types::{Proposal, SharedState, StateUpdate};
use crate::io::generation::GenerationClient;
use crate::io::prompt::planner_prompt;

use super::failure_text;

/// Planner step. Stateless; all inputs come from the shared state.
#[derive(Debug, Clone, Default)]
pub struct PlannerAgent;

impl PlannerAgent {
    pub fn new() -> Self {
        Self
    }

    /// Produce `{plan_proposal}` for `state`. Never fails.
    #[instrument(skip_all, fields(turn = state.turn_count, revision = state.review_feedback.is_some()))]
    pub fn run<C: GenerationClient + ?Sized>(&self, client: &C, state: &SharedState) -> StateUpdate {
        StateUpdate::plan(self.propose(client, state))
    }

    fn propose<C: GenerationClient + ?Sized>(&self, client: &C, state: &SharedState) -> Proposal {
        let prompt = match planner_prompt(state) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "planner prompt failed");
                return Proposal::degraded(failure_text(format!("{err:#}")));
            }
        };

        let raw = match client.generate(&state.model_id, &prompt) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(err = %err, "planner generation failed");
                return Proposal::degraded(failure_text(&err));
            }
        };

        let coerced = coerce::<Proposal>(&raw);
        if let Coerced::Fallback { reason, .. } = &coerced {
            debug!(%reason, "planner reply kept as prose");
        }
        let proposal = coerced.into_record();
        info!(steps = proposal.steps.len(), "planner produced proposal");
        proposal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Feedback;
    use crate::io::generation::GenerationError;
    use crate::test_support::{ScriptedClient, proposal_json, shared_state};

    #[test]
    fn planner_coerces_structured_reply() {
        let client = ScriptedClient::new(vec![Ok(proposal_json("outline", &["a", "b"]))]);
        let state = shared_state("build a cli");

        let update = PlannerAgent::new().run(&client, &state);

        assert_eq!(
            update,
            StateUpdate::plan(Proposal {
                plan: "outline".to_string(),
                steps: vec!["a".to_string(), "b".to_string()],
            })
        );
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model_id, state.model_id);
        assert!(calls[0].prompt.contains("Task: build a cli"));
    }

    #[test]
    fn planner_keeps_prose_reply_as_plan() {
        let client = ScriptedClient::new(vec![Ok("1. read 2. write".to_string())]);

        let update = PlannerAgent::new().run(&client, &shared_state("t"));

        assert_eq!(update, StateUpdate::plan(Proposal::degraded("1. read 2. write")));
    }

    #[test]
    fn planner_failure_becomes_error_plan() {
        let client = ScriptedClient::new(vec![Err(GenerationError::Unavailable(
            "connection refused".to_string(),
        ))]);

        let update = PlannerAgent::new().run(&client, &shared_state("t"));

        let proposal = update.plan_proposal.expect("proposal");
        assert_eq!(
            proposal.plan,
            "Error: generation backend unavailable: connection refused"
        );
        assert!(proposal.steps.is_empty());
        assert!(update.review_feedback.is_none());
        assert!(update.turn_count.is_none());
    }

    #[test]
    fn planner_requests_revision_when_feedback_exists() {
        let client = ScriptedClient::new(vec![Ok(proposal_json("v2", &[]))]);
        let mut state = shared_state("t");
        state.plan_proposal = Some(Proposal::degraded("v1"));
        state.review_feedback = Some(Feedback::degraded("too vague", true));

        PlannerAgent::new().run(&client, &state);

        let prompt = &client.calls()[0].prompt;
        assert!(prompt.contains("IMPROVED"));
        assert!(prompt.contains("too vague"));
    }
}
