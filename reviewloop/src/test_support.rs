//! Test-only generation clients and fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use crate::core::types::{RunRequest, SharedState};
use crate::io::config::{ControllerConfig, write_config};
use crate::io::generation::{GenerationClient, GenerationError};

pub const TEST_MODEL: &str = "test-model";

/// One `generate` call as seen by a test client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCall {
    pub model_id: String,
    pub prompt: String,
}

/// Replays queued responses in order and records every call.
///
/// Once the queue is empty every call fails with `Unavailable`.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    responses: RefCell<VecDeque<Result<String, GenerationError>>>,
    calls: RefCell<Vec<GenerationCall>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.borrow().clone()
    }
}

impl GenerationClient for ScriptedClient {
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError> {
        record(&self.calls, model_id, prompt);
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Unavailable("scripted client exhausted".to_string())))
    }
}

/// Answers planner prompts with `plan` and reviewer prompts with `review`.
#[derive(Debug)]
pub struct RoleClient {
    plan: String,
    review: String,
    calls: RefCell<Vec<GenerationCall>>,
}

impl RoleClient {
    pub fn new(plan: impl Into<String>, review: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            review: review.into(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.borrow().clone()
    }
}

impl GenerationClient for RoleClient {
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError> {
        record(&self.calls, model_id, prompt);
        if prompt.starts_with("You are a Reviewer Agent") {
            Ok(self.review.clone())
        } else {
            Ok(self.plan.clone())
        }
    }
}

/// Fails every call with the same error.
#[derive(Debug)]
pub struct FailingClient {
    error: GenerationError,
    calls: RefCell<Vec<GenerationCall>>,
}

impl FailingClient {
    pub fn new(error: GenerationError) -> Self {
        Self {
            error,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.borrow().clone()
    }
}

impl GenerationClient for FailingClient {
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError> {
        record(&self.calls, model_id, prompt);
        Err(self.error.clone())
    }
}

fn record(calls: &RefCell<Vec<GenerationCall>>, model_id: &str, prompt: &str) {
    calls.borrow_mut().push(GenerationCall {
        model_id: model_id.to_string(),
        prompt: prompt.to_string(),
    });
}

/// A well-formed planner reply.
pub fn proposal_json(plan: &str, steps: &[&str]) -> String {
    json!({ "plan": plan, "steps": steps }).to_string()
}

/// A well-formed reviewer reply.
pub fn feedback_json(feedback: &str, has_issues: bool, suggestions: &[&str]) -> String {
    json!({
        "feedback": feedback,
        "has_issues": has_issues,
        "suggestions": suggestions,
    })
    .to_string()
}

/// Balanced-mode request against [`TEST_MODEL`].
pub fn request(task: &str) -> RunRequest {
    RunRequest {
        task: task.to_string(),
        model_id: TEST_MODEL.to_string(),
        strict_mode: false,
    }
}

/// Initial state for [`request`].
pub fn shared_state(task: &str) -> SharedState {
    SharedState::new(&request(task))
}

/// Scratch directory holding a controller config file.
pub struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Write `config` as `reviewloop.toml` and return its path.
    pub fn write(&self, config: &ControllerConfig) -> anyhow::Result<PathBuf> {
        let path = self.dir.path().join("reviewloop.toml");
        write_config(&path, config)?;
        Ok(path)
    }
}
