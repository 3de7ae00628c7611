//! Supervisor step: the turn counter.

use crate::core::types::{SharedState, StateUpdate};

/// Count one more supervisor visit. Touches nothing but `turn_count`.
pub fn supervise(state: &SharedState) -> StateUpdate {
    StateUpdate::turn(state.turn_count.saturating_add(1))
}
