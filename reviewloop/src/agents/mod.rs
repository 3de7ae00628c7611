//! Agent steps for planning and reviewing.
//!
//! Each agent renders a prompt, calls the generation client once, and coerces
//! the reply. Every failure becomes a degraded record so the loop always
//! makes progress.

use std::fmt::Display;

pub mod planner;
pub mod reviewer;

/// Prose recorded in place of a reply when a step could not get one.
pub(crate) fn failure_text(err: impl Display) -> String {
    format!("Error: {err}")
}
