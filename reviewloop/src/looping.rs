//! Controller loop: supervisor, route, agent step, repeat until stop.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::invariants::validate_input;
use crate::core::router::{DEFAULT_MAX_TURNS, Decision, decide};
use crate::core::state_update::apply_update;
use crate::core::types::{RunRequest, SharedState, StepName, StopReason, TraceEntry};
use crate::io::config::ControllerConfig;
use crate::io::generation::GenerationClient;
use crate::step::StepRunner;

/// Invalid caller input; raised before any step runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("run aborted: {}", reasons.join("; "))]
pub struct RunAborted {
    pub reasons: Vec<String>,
}

/// Loop parameters resolved from configuration and CLI overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub max_turns: u32,
    pub failed_review_has_issues: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            failed_review_has_issues: false,
        }
    }
}

impl From<&ControllerConfig> for LoopConfig {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            failed_review_has_issues: config.policy.failed_review_has_issues,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopOutcome {
    /// One entry per executed step, in execution order.
    pub trace: Vec<TraceEntry>,
    pub final_state: SharedState,
    pub stop: StopReason,
    pub steps_executed: u32,
}

/// Validate `request`, build the initial state and drive the loop to a stop.
///
/// `on_step` sees every trace entry as soon as its update has been merged.
pub fn run_loop<C, F>(
    request: &RunRequest,
    client: &C,
    config: &LoopConfig,
    on_step: F,
) -> Result<LoopOutcome, RunAborted>
where
    C: GenerationClient + ?Sized,
    F: FnMut(&TraceEntry),
{
    run_from_state(SharedState::new(request), client, config, on_step)
}

/// Like [`run_loop`], but only the final state is returned.
pub fn run_final<C: GenerationClient + ?Sized>(
    request: &RunRequest,
    client: &C,
    config: &LoopConfig,
) -> Result<SharedState, RunAborted> {
    run_loop(request, client, config, |_| {}).map(|outcome| outcome.final_state)
}

/// Drive the loop from an arbitrary initial state.
///
/// The supervisor is the only entry point and the only step that routes;
/// agent steps always hand control back to it.
#[instrument(skip_all, fields(max_turns = config.max_turns, strict = initial.strict_mode))]
pub fn run_from_state<C, F>(
    initial: SharedState,
    client: &C,
    config: &LoopConfig,
    mut on_step: F,
) -> Result<LoopOutcome, RunAborted>
where
    C: GenerationClient + ?Sized,
    F: FnMut(&TraceEntry),
{
    let reasons = validate_input(&initial);
    if !reasons.is_empty() {
        return Err(RunAborted { reasons });
    }

    let runner = StepRunner::new(client, config.failed_review_has_issues);
    let mut state = initial;
    let mut trace = Vec::new();
    let mut record = |trace: &mut Vec<TraceEntry>, entry: TraceEntry| {
        on_step(&entry);
        trace.push(entry);
    };

    loop {
        let update = runner.run(StepName::Supervisor, &state);
        let written = apply_update(&mut state, &update);
        debug!(step = "supervisor", ?written, "merged update");

        let decision = decide(&state, config.max_turns);
        info!(turn = state.turn_count, ?decision, "routed");
        record(
            &mut trace,
            TraceEntry {
                step: StepName::Supervisor,
                update,
                state: state.clone(),
                route: Some(decision.into()),
            },
        );

        let step = match decision {
            Decision::Planner => StepName::Planner,
            Decision::Reviewer => StepName::Reviewer,
            Decision::Stop(stop) => {
                let steps_executed = step_count(trace.len());
                info!(?stop, turn = state.turn_count, steps_executed, "loop stopped");
                return Ok(LoopOutcome {
                    trace,
                    final_state: state,
                    stop,
                    steps_executed,
                });
            }
        };

        let update = runner.run(step, &state);
        let written = apply_update(&mut state, &update);
        debug!(step = step.as_str(), ?written, "merged update");
        record(
            &mut trace,
            TraceEntry {
                step,
                update,
                state: state.clone(),
                route: None,
            },
        );
    }
}

/// Trace length as a step count, saturating at `u32::MAX`.
fn step_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
