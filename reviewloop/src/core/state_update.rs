//! Field-level merge of step updates into the shared state.

use crate::core::types::{SharedState, StateUpdate};

/// Overwrite every field present in `update` and leave the rest untouched.
///
/// Nested records are replaced wholesale, never merged. Returns the names of
/// the fields that were written, in declaration order.
pub fn apply_update(state: &mut SharedState, update: &StateUpdate) -> Vec<&'static str> {
    let mut written = Vec::new();

    if let Some(proposal) = &update.plan_proposal {
        state.plan_proposal = Some(proposal.clone());
        written.push("plan_proposal");
    }
    if let Some(feedback) = &update.review_feedback {
        state.review_feedback = Some(feedback.clone());
        written.push("review_feedback");
    }
    if let Some(turn_count) = update.turn_count {
        state.turn_count = turn_count;
        written.push("turn_count");
    }

    written
}
