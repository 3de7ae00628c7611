//! Generation client abstraction.
//!
//! The [`GenerationClient`] trait decouples the agent steps from the actual
//! text-generation backend (by default `ollama run <model>`). Tests use
//! scripted clients that return predetermined text without spawning
//! processes.

use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::io::config::{GenerationConfig, MODEL_PLACEHOLDER};
use crate::io::process::run_with_input;

/// Failure of a single generation call.
///
/// Agent steps absorb these into degraded records; they never reach the loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("generation failed with exit code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// Synchronous text generation: prompt in, raw text out.
pub trait GenerationClient {
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError>;
}

impl<C: GenerationClient + ?Sized> GenerationClient for &C {
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(model_id, prompt)
    }
}

/// Client that runs a configured command, writes the prompt to its stdin,
/// and reads the response from its stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerationClient {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandGenerationClient {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    /// Build the command for `model_id`, substituting every `{model}` placeholder.
    fn build_command(&self, model_id: &str) -> Result<Command, GenerationError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| GenerationError::Unavailable("empty generation command".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args.iter().map(|arg| arg.replace(MODEL_PLACEHOLDER, model_id)));
        Ok(cmd)
    }
}

impl GenerationClient for CommandGenerationClient {
    #[instrument(skip_all, fields(model_id = %model_id, timeout_secs = self.timeout.as_secs()))]
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError> {
        info!(program = ?self.command.first(), prompt_bytes = prompt.len(), "starting generation");

        let cmd = self.build_command(model_id)?;
        let output = run_with_input(cmd, prompt.as_bytes(), self.timeout, self.output_limit_bytes)
            .map_err(|err| GenerationError::Unavailable(format!("{err:#}")))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "generation timed out");
            return Err(GenerationError::TimedOut(self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generation command failed");
            return Err(GenerationError::Failed {
                code: output.status.code(),
                stderr: output.stderr.lossy().trim().to_string(),
            });
        }
        if output.stdout.dropped > 0 {
            warn!(
                dropped = output.stdout.dropped,
                "generation output truncated; response will likely fall back to prose"
            );
        }

        let response = output.stdout.lossy().trim().to_string();
        debug!(response_bytes = response.len(), "generation completed");
        Ok(response)
    }
}
