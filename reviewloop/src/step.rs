//! Dispatch of a single controller step.

use crate::agents::planner::PlannerAgent;
use crate::agents::reviewer::ReviewerAgent;
use crate::core::supervisor::supervise;
use crate::core::types::{SharedState, StateUpdate, StepName};
use crate::io::generation::GenerationClient;

/// Binds the agent steps to one generation client for the length of a run.
pub struct StepRunner<'a, C: GenerationClient + ?Sized> {
    client: &'a C,
    planner: PlannerAgent,
    reviewer: ReviewerAgent,
}

impl<'a, C: GenerationClient + ?Sized> StepRunner<'a, C> {
    pub fn new(client: &'a C, failed_review_has_issues: bool) -> Self {
        Self {
            client,
            planner: PlannerAgent::new(),
            reviewer: ReviewerAgent::new(failed_review_has_issues),
        }
    }

    /// Run `step` against `state` and return its partial update.
    ///
    /// Only the planner and reviewer call the client; the supervisor is pure.
    pub fn run(&self, step: StepName, state: &SharedState) -> StateUpdate {
        match step {
            StepName::Supervisor => supervise(state),
            StepName::Planner => self.planner.run(self.client, state),
            StepName::Reviewer => self.reviewer.run(self.client, state),
        }
    }
}
