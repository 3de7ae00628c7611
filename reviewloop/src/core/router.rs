//! Deterministic routing between supervisor visits.

use crate::core::types::{Route, SharedState, StopReason};

/// Default number of supervisor visits after which loop-backs are refused.
pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Router decision including the reason for stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Planner,
    Reviewer,
    Stop(StopReason),
}

impl From<Decision> for Route {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Planner => Route::Planner,
            Decision::Reviewer => Route::Reviewer,
            Decision::Stop(_) => Route::Stop,
        }
    }
}

/// Pick the next step for `state`.
///
/// Rules, first match wins:
/// 1. no plan yet -> planner
/// 2. plan not reviewed yet -> reviewer
/// 3. review has no issues -> stop (converged)
/// 4. `turn_count >= max_turns` -> stop (turn limit), otherwise planner
///
/// The turn limit only gates loop-backs; bootstrap and the first review always run.
pub fn decide(state: &SharedState, max_turns: u32) -> Decision {
    if state.plan_proposal.is_none() {
        return Decision::Planner;
    }
    let Some(feedback) = &state.review_feedback else {
        return Decision::Reviewer;
    };
    if !feedback.has_issues {
        return Decision::Stop(StopReason::Converged);
    }
    if state.turn_count >= max_turns {
        return Decision::Stop(StopReason::TurnLimit);
    }
    Decision::Planner
}

/// Same as [`decide`], projected onto [`Route`].
pub fn route(state: &SharedState, max_turns: u32) -> Route {
    decide(state, max_turns).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Feedback, Proposal, RunRequest};

    fn state(turn_count: u32, plan: bool, feedback: Option<bool>) -> SharedState {
        let mut state = SharedState::new(&RunRequest {
            task: "t".to_string(),
            model_id: "m".to_string(),
            strict_mode: false,
        });
        state.turn_count = turn_count;
        if plan {
            state.plan_proposal = Some(Proposal::degraded("p"));
        }
        state.review_feedback = feedback.map(|has_issues| Feedback::degraded("f", has_issues));
        state
    }

    #[test]
    fn bootstrap_routes_to_planner_regardless_of_turns() {
        for turns in [0, 1, DEFAULT_MAX_TURNS, 1_000] {
            assert_eq!(route(&state(turns, false, None), DEFAULT_MAX_TURNS), Route::Planner);
        }
    }

    #[test]
    fn unreviewed_plan_routes_to_reviewer_regardless_of_turns() {
        for turns in [1, DEFAULT_MAX_TURNS, 1_000] {
            assert_eq!(route(&state(turns, true, None), DEFAULT_MAX_TURNS), Route::Reviewer);
        }
    }

    #[test]
    fn stale_feedback_without_plan_still_bootstraps() {
        assert_eq!(decide(&state(3, false, Some(true)), 5), Decision::Planner);
    }

    #[test]
    fn approval_stops_as_converged() {
        assert_eq!(
            decide(&state(2, true, Some(false)), 5),
            Decision::Stop(StopReason::Converged)
        );
        assert_eq!(
            decide(&state(99, true, Some(false)), 5),
            Decision::Stop(StopReason::Converged)
        );
    }

    #[test]
    fn issues_loop_back_below_limit() {
        assert_eq!(decide(&state(4, true, Some(true)), 5), Decision::Planner);
    }

    #[test]
    fn issues_stop_at_and_beyond_limit() {
        assert_eq!(
            decide(&state(5, true, Some(true)), 5),
            Decision::Stop(StopReason::TurnLimit)
        );
        assert_eq!(
            decide(&state(6, true, Some(true)), 5),
            Decision::Stop(StopReason::TurnLimit)
        );
    }

    #[test]
    fn decision_projects_onto_route() {
        assert_eq!(Route::from(Decision::Planner), Route::Planner);
        assert_eq!(Route::from(Decision::Reviewer), Route::Reviewer);
        assert_eq!(Route::from(Decision::Stop(StopReason::TurnLimit)), Route::Stop);
        assert_eq!(Route::Stop.step(), None);
    }
}
