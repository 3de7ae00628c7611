//! Prompt rendering for the planner and reviewer steps.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::types::SharedState;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const REVIEWER_TEMPLATE: &str = include_str!("prompts/reviewer.md");

const STRICT_TONE: &str = "very strict and critical";
const BALANCED_TONE: &str = "balanced and constructive";

static ENGINE: LazyLock<PromptEngine> = LazyLock::new(|| {
    PromptEngine::new().unwrap_or_else(|err| panic!("embedded prompt templates: {err:#}"))
});

/// Template engine wrapper around minijinja. Built once per process.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("load planner template")?;
        env.add_template("reviewer", REVIEWER_TEMPLATE)
            .context("load reviewer template")?;
        Ok(Self { env })
    }

    fn render_planner(&self, state: &SharedState) -> Result<String> {
        // Revision mode is keyed on the presence of feedback, not on the turn count.
        let feedback = state.review_feedback.as_ref().map(pretty).transpose()?;
        let previous_plan = match &feedback {
            Some(_) => state.plan_proposal.as_ref().map(pretty).transpose()?,
            None => None,
        };
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! {
            task => state.task.trim(),
            feedback => feedback,
            previous_plan => previous_plan,
        })?;
        Ok(rendered)
    }

    fn render_reviewer(&self, state: &SharedState) -> Result<String> {
        let plan = pretty(&state.plan_proposal)?;
        let template = self.env.get_template("reviewer")?;
        let rendered = template.render(context! {
            task => state.task.trim(),
            plan => plan,
            tone => reviewer_tone(state.strict_mode),
        })?;
        Ok(rendered)
    }
}

/// Tone directive for the reviewer.
pub fn reviewer_tone(strict_mode: bool) -> &'static str {
    if strict_mode {
        STRICT_TONE
    } else {
        BALANCED_TONE
    }
}

/// Render the planner prompt: a first draft, or a revision when feedback exists.
pub fn planner_prompt(state: &SharedState) -> Result<String> {
    let rendered = ENGINE
        .render_planner(state)
        .context("render planner prompt")?;
    debug!(
        bytes = rendered.len(),
        revision = state.review_feedback.is_some(),
        "rendered planner prompt"
    );
    Ok(rendered.trim().to_string())
}

/// Render the reviewer prompt for the current plan.
pub fn reviewer_prompt(state: &SharedState) -> Result<String> {
    let rendered = ENGINE
        .render_reviewer(state)
        .context("render reviewer prompt")?;
    debug!(bytes = rendered.len(), strict = state.strict_mode, "rendered reviewer prompt");
    Ok(rendered.trim().to_string())
}

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize prompt input")
}
