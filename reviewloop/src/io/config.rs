//! Controller configuration stored as TOML (default `reviewloop.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::router::DEFAULT_MAX_TURNS;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "reviewloop.toml";

/// Placeholder in `generation.command` replaced by the model id.
pub const MODEL_PLACEHOLDER: &str = "{model}";

/// Controller configuration (TOML).
///
/// Missing fields fall back to defaults, so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Supervisor visits after which the router refuses further loop-backs.
    pub max_turns: u32,

    /// Model id used when the caller does not pass one.
    pub model_id: String,

    pub generation: GenerationConfig,

    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Command that answers a prompt on stdin (e.g. `["ollama","run","{model}"]`).
    pub command: Vec<String>,

    /// Per-call wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Verdict recorded when the reviewer's generation call fails.
    /// `false` lets the run converge; `true` forces a loop-back.
    pub failed_review_has_issues: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "ollama".to_string(),
                "run".to_string(),
                MODEL_PLACEHOLDER.to_string(),
            ],
            timeout_secs: 5 * 60,
            output_limit_bytes: 200_000,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            model_id: "smollm:1.7b".to_string(),
            generation: GenerationConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.generation.timeout_secs == 0 {
            return Err(anyhow!("generation.timeout_secs must be > 0"));
        }
        if self.generation.output_limit_bytes == 0 {
            return Err(anyhow!("generation.output_limit_bytes must be > 0"));
        }
        if self.generation.command.is_empty() || self.generation.command[0].trim().is_empty() {
            return Err(anyhow!("generation.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ControllerConfig::default()`.
pub fn load_config(path: &Path) -> Result<ControllerConfig> {
    if !path.exists() {
        let cfg = ControllerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ControllerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ControllerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
