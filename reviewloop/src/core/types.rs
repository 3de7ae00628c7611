//! Shared deterministic types for the controller core.
//!
//! These types define stable contracts between the router, the steps, and the
//! loop. They carry no I/O handles and serialize with snake_case keys so a
//! trace can be rendered as plain JSON.

use serde::{Deserialize, Serialize};

/// Caller input for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Description of the work item to plan.
    pub task: String,
    /// Generation backend identifier passed through to every client call.
    pub model_id: String,
    /// Selects the reviewer's tone. Has no effect on routing.
    pub strict_mode: bool,
}

/// Structured planner output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Prose plan, or an error marker when the planner degraded.
    pub plan: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl Proposal {
    /// A proposal that only carries prose.
    pub fn degraded(plan: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            steps: Vec::new(),
        }
    }
}

/// Structured reviewer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback: String,
    /// Whether the reviewer wants another planning pass. Never left undefined:
    /// missing or ambiguous input reads as `false`.
    #[serde(default, alias = "hasIssues")]
    pub has_issues: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Feedback {
    /// Feedback that only carries prose and an explicit verdict.
    pub fn degraded(feedback: impl Into<String>, has_issues: bool) -> Self {
        Self {
            feedback: feedback.into(),
            has_issues,
            suggestions: Vec::new(),
        }
    }
}

/// The single record threaded through every step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    pub task: String,
    pub model_id: String,
    pub strict_mode: bool,
    /// Last plan produced; `None` until the planner has run once.
    pub plan_proposal: Option<Proposal>,
    /// Last review produced; `None` until the reviewer has run once.
    pub review_feedback: Option<Feedback>,
    /// Number of completed supervisor visits.
    pub turn_count: u32,
}

impl SharedState {
    pub fn new(request: &RunRequest) -> Self {
        Self {
            task: request.task.clone(),
            model_id: request.model_id.clone(),
            strict_mode: request.strict_mode,
            plan_proposal: None,
            review_feedback: None,
            turn_count: 0,
        }
    }
}

/// Partial update returned by a step. Present fields overwrite; absent fields
/// leave the state untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_proposal: Option<Proposal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_count: Option<u32>,
}

impl StateUpdate {
    pub fn plan(proposal: Proposal) -> Self {
        Self {
            plan_proposal: Some(proposal),
            ..Self::default()
        }
    }

    pub fn review(feedback: Feedback) -> Self {
        Self {
            review_feedback: Some(feedback),
            ..Self::default()
        }
    }

    pub fn turn(turn_count: u32) -> Self {
        Self {
            turn_count: Some(turn_count),
            ..Self::default()
        }
    }
}

/// Closed set of executable steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Supervisor,
    Planner,
    Reviewer,
}

impl StepName {
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::Supervisor => "supervisor",
            StepName::Planner => "planner",
            StepName::Reviewer => "reviewer",
        }
    }
}

/// Router output: the next agent step, or termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Planner,
    Reviewer,
    Stop,
}

impl Route {
    /// Step the loop executes for this route. `Stop` maps to nothing.
    pub fn step(self) -> Option<StepName> {
        match self {
            Route::Planner => Some(StepName::Planner),
            Route::Reviewer => Some(StepName::Reviewer),
            Route::Stop => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Route::Planner => "planner",
            Route::Reviewer => "reviewer",
            Route::Stop => "stop",
        }
    }
}

/// Why a run reached `Route::Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The latest review reported no issues.
    Converged,
    /// Issues remain but the turn budget is spent.
    TurnLimit,
}

/// One executed step, recorded after its update was merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: StepName,
    pub update: StateUpdate,
    /// Full state after the merge.
    pub state: SharedState,
    /// Router decision taken right after this entry. Only set for supervisor visits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
}
