//! Input invariants checked once before a run starts.

use crate::core::types::SharedState;

/// Check the caller-supplied fields of an initial state:
/// - `task` is not blank
/// - `model_id` is not blank
///
/// Returns every violation, not just the first.
pub fn validate_input(state: &SharedState) -> Vec<String> {
    let mut errors = Vec::new();

    if state.task.trim().is_empty() {
        errors.push("task must not be empty".to_string());
    }

    if state.model_id.trim().is_empty() {
        errors.push("model_id must not be empty".to_string());
    }

    errors
}
