//! Loop-level tests for full controller runs.
//!
//! These drive `run_loop` end to end with scripted generation clients and
//! check ordering, termination and what each step sends to the model.

use reviewloop::core::types::{Route, RunRequest, StepName, StopReason, TraceEntry};
use reviewloop::io::generation::GenerationError;
use reviewloop::looping::{LoopConfig, run_final, run_loop};
use reviewloop::test_support::{
    FailingClient, RoleClient, ScriptedClient, TEST_MODEL, feedback_json, proposal_json, request,
};

fn step_names(trace: &[TraceEntry]) -> Vec<StepName> {
    trace.iter().map(|entry| entry.step).collect()
}

fn never_satisfied() -> RoleClient {
    RoleClient::new(
        proposal_json("draft", &["one"]),
        feedback_json("still missing error handling", true, &["handle errors"]),
    )
}

/// Reviewer approves the first plan.
///
/// Trace: supervisor(1) -> planner -> supervisor(2) -> reviewer -> supervisor(3) stop.
#[test]
fn first_approval_converges_after_three_supervisor_visits() {
    let client = ScriptedClient::new(vec![
        Ok(proposal_json("write the parser", &["lex", "parse"])),
        Ok(feedback_json("solid", false, &[])),
    ]);

    let outcome =
        run_loop(&request("X"), &client, &LoopConfig::default(), |_| {}).expect("run");

    assert_eq!(
        step_names(&outcome.trace),
        vec![
            StepName::Supervisor,
            StepName::Planner,
            StepName::Supervisor,
            StepName::Reviewer,
            StepName::Supervisor,
        ]
    );
    let routes: Vec<Option<Route>> = outcome.trace.iter().map(|entry| entry.route).collect();
    assert_eq!(
        routes,
        vec![
            Some(Route::Planner),
            None,
            Some(Route::Reviewer),
            None,
            Some(Route::Stop),
        ]
    );
    assert_eq!(outcome.stop, StopReason::Converged);
    assert_eq!(outcome.final_state.turn_count, 3);
    assert_eq!(
        outcome.final_state.plan_proposal.expect("plan").steps,
        vec!["lex".to_string(), "parse".to_string()]
    );
    assert!(!outcome.final_state.review_feedback.expect("review").has_issues);
}

/// Reviewer never approves; the turn limit ends the run.
///
/// The first review stays in state, so every later supervisor visit loops
/// straight back to the planner until turn 5.
#[test]
fn persistent_issues_stop_at_turn_limit() {
    let client = never_satisfied();

    let outcome =
        run_loop(&request("X"), &client, &LoopConfig::default(), |_| {}).expect("run");

    assert_eq!(outcome.stop, StopReason::TurnLimit);
    assert_eq!(outcome.final_state.turn_count, 5);
    assert_eq!(
        step_names(&outcome.trace),
        vec![
            StepName::Supervisor,
            StepName::Planner,
            StepName::Supervisor,
            StepName::Reviewer,
            StepName::Supervisor,
            StepName::Planner,
            StepName::Supervisor,
            StepName::Planner,
            StepName::Supervisor,
        ]
    );
    let loop_backs = outcome
        .trace
        .windows(2)
        .filter(|pair| {
            pair[0].step == StepName::Supervisor
                && pair[1].step == StepName::Planner
                && pair[0].state.review_feedback.is_some()
        })
        .count();
    assert_eq!(loop_backs, 2);
    assert!(outcome.final_state.review_feedback.expect("review").has_issues);
}

/// Every call fails; both records carry the failure text and the run converges.
#[test]
fn failing_client_converges_with_error_records() {
    let client = FailingClient::new(GenerationError::Unavailable("connection refused".to_string()));

    let outcome =
        run_loop(&request("X"), &client, &LoopConfig::default(), |_| {}).expect("run");

    assert_eq!(outcome.stop, StopReason::Converged);
    assert_eq!(outcome.steps_executed, 5);
    let plan = outcome.final_state.plan_proposal.expect("plan");
    let review = outcome.final_state.review_feedback.expect("review");
    assert!(plan.plan.contains("connection refused"));
    assert!(plan.plan.starts_with("Error: "));
    assert!(plan.steps.is_empty());
    assert!(review.feedback.contains("connection refused"));
    assert!(!review.has_issues);
    assert_eq!(client.calls().len(), 2);
}

#[test]
fn failed_reviews_can_be_treated_as_issues() {
    let client = FailingClient::new(GenerationError::TimedOut(std::time::Duration::from_secs(1)));
    let config = LoopConfig {
        failed_review_has_issues: true,
        ..LoopConfig::default()
    };

    let outcome = run_loop(&request("X"), &client, &config, |_| {}).expect("run");

    assert_eq!(outcome.stop, StopReason::TurnLimit);
    assert_eq!(outcome.final_state.turn_count, config.max_turns);
    assert!(outcome.final_state.review_feedback.expect("review").has_issues);
}

#[test]
fn reviewer_never_runs_before_a_plan_exists() {
    for max_turns in 1..=6 {
        let client = never_satisfied();
        let config = LoopConfig {
            max_turns,
            ..LoopConfig::default()
        };

        let outcome = run_loop(&request("X"), &client, &config, |_| {}).expect("run");

        let first_planner = outcome.trace.iter().position(|e| e.step == StepName::Planner);
        let first_reviewer = outcome.trace.iter().position(|e| e.step == StepName::Reviewer);
        assert_eq!(first_planner, Some(1), "max_turns={max_turns}");
        assert!(first_reviewer > first_planner, "max_turns={max_turns}");
        assert_eq!(outcome.trace[0].route, Some(Route::Planner));
    }
}

#[test]
fn step_count_stays_bounded_by_max_turns() {
    for max_turns in 0..=8u32 {
        let client = never_satisfied();
        let config = LoopConfig {
            max_turns,
            ..LoopConfig::default()
        };

        let outcome = run_loop(&request("X"), &client, &config, |_| {}).expect("run");

        let expected = 2 * max_turns.max(3) - 1;
        assert_eq!(outcome.steps_executed, expected, "max_turns={max_turns}");
        if max_turns >= 2 {
            assert!(outcome.steps_executed <= 2 * max_turns + 2, "max_turns={max_turns}");
        }
        assert_eq!(outcome.stop, StopReason::TurnLimit);
    }
}

#[test]
fn streamed_entries_match_returned_trace() {
    let client = never_satisfied();
    let mut streamed = Vec::new();

    let outcome = run_loop(&request("X"), &client, &LoopConfig::default(), |entry| {
        streamed.push(entry.clone());
    })
    .expect("run");

    assert_eq!(streamed, outcome.trace);
    assert_eq!(outcome.steps_executed as usize, streamed.len());
    assert_eq!(outcome.trace.last().map(|e| &e.state), Some(&outcome.final_state));
}

#[test]
fn trace_states_only_change_the_written_field() {
    let client = never_satisfied();

    let outcome =
        run_loop(&request("X"), &client, &LoopConfig::default(), |_| {}).expect("run");

    for pair in outcome.trace.windows(2) {
        let (before, after) = (&pair[0].state, &pair[1].state);
        assert_eq!(before.task, after.task);
        assert_eq!(before.model_id, after.model_id);
        match pair[1].step {
            StepName::Supervisor => {
                assert_eq!(after.turn_count, before.turn_count + 1);
                assert_eq!(after.plan_proposal, before.plan_proposal);
                assert_eq!(after.review_feedback, before.review_feedback);
            }
            StepName::Planner => {
                assert_eq!(after.turn_count, before.turn_count);
                assert_eq!(after.review_feedback, before.review_feedback);
            }
            StepName::Reviewer => {
                assert_eq!(after.turn_count, before.turn_count);
                assert_eq!(after.plan_proposal, before.plan_proposal);
            }
        }
    }
}

#[test]
fn run_final_matches_loop_final_state() {
    let final_state =
        run_final(&request("X"), &never_satisfied(), &LoopConfig::default()).expect("run");
    let outcome =
        run_loop(&request("X"), &never_satisfied(), &LoopConfig::default(), |_| {}).expect("run");

    assert_eq!(final_state, outcome.final_state);
}

#[test]
fn blank_task_aborts_without_calling_the_model() {
    let client = never_satisfied();

    let err = run_final(&request("   "), &client, &LoopConfig::default()).unwrap_err();

    assert_eq!(err.reasons, vec!["task must not be empty".to_string()]);
    assert!(client.calls().is_empty());
}

#[test]
fn revisions_send_previous_plan_and_feedback() {
    let client = never_satisfied();

    run_loop(&request("Plan a garden"), &client, &LoopConfig::default(), |_| {}).expect("run");

    let calls = client.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|call| call.model_id == TEST_MODEL));

    assert!(calls[0].prompt.contains("Task: Plan a garden"));
    assert!(!calls[0].prompt.contains("IMPROVED"));
    assert!(calls[1].prompt.starts_with("You are a Reviewer Agent"));
    assert!(calls[1].prompt.contains("\"plan\": \"draft\""));
    for revision in &calls[2..] {
        assert!(revision.prompt.contains("Original task: Plan a garden"));
        assert!(revision.prompt.contains("still missing error handling"));
        assert!(revision.prompt.contains("handle errors"));
        assert!(revision.prompt.contains("\"plan\": \"draft\""));
    }
}

#[test]
fn strict_mode_changes_reviewer_tone_only() {
    let strict = RoleClient::new(proposal_json("p", &[]), feedback_json("ok", false, &[]));
    let balanced = RoleClient::new(proposal_json("p", &[]), feedback_json("ok", false, &[]));
    let strict_request = RunRequest {
        strict_mode: true,
        ..request("X")
    };

    let strict_outcome =
        run_loop(&strict_request, &strict, &LoopConfig::default(), |_| {}).expect("run");
    let balanced_outcome =
        run_loop(&request("X"), &balanced, &LoopConfig::default(), |_| {}).expect("run");

    assert!(strict.calls()[1].prompt.ends_with("Be very strict and critical."));
    assert!(balanced.calls()[1].prompt.ends_with("Be balanced and constructive."));
    assert_eq!(strict.calls()[0].prompt, balanced.calls()[0].prompt);
    assert_eq!(
        step_names(&strict_outcome.trace),
        step_names(&balanced_outcome.trace)
    );
}

#[test]
fn prose_review_converges() {
    let client = RoleClient::new(
        "1. Dig beds\n2. Plant seeds",
        "This plan looks reasonable overall.",
    );

    let outcome =
        run_loop(&request("X"), &client, &LoopConfig::default(), |_| {}).expect("run");

    assert_eq!(outcome.stop, StopReason::Converged);
    let plan = outcome.final_state.plan_proposal.expect("plan");
    assert_eq!(plan.plan, "1. Dig beds\n2. Plant seeds");
    assert!(plan.steps.is_empty());
    assert_eq!(
        outcome.final_state.review_feedback.expect("review").feedback,
        "This plan looks reasonable overall."
    );
}

#[test]
fn fenced_replies_are_parsed() {
    let client = ScriptedClient::new(vec![
        Ok(format!(
            "Here is the plan:\n```json\n{}\n```",
            proposal_json("fenced", &["a"])
        )),
        Ok(format!("```\n{}\n```", feedback_json("fine", false, &[]))),
    ]);

    let outcome =
        run_loop(&request("X"), &client, &LoopConfig::default(), |_| {}).expect("run");

    let plan = outcome.final_state.plan_proposal.expect("plan");
    assert_eq!(plan.plan, "fenced");
    assert_eq!(plan.steps, vec!["a".to_string()]);
    assert_eq!(outcome.stop, StopReason::Converged);
}
