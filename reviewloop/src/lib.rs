//! Planner/reviewer loop controller.
//!
//! A supervisor step counts turns and a deterministic router picks the next
//! step: the planner drafts or revises a plan, the reviewer critiques it, and
//! the loop stops once a review reports no issues or the turn limit is hit.
//!
//! - **[`core`]**: Pure, deterministic logic (state merge, routing, coercion).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (generation process, config files,
//!   prompt rendering, run records).
//! - **[`agents`]**: Planner and reviewer steps; they absorb generation
//!   failures into degraded records.
//!
//! [`looping`] drives the supervisor/agent cycle; [`step`] dispatches a single
//! step.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
