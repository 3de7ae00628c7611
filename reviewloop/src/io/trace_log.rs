//! JSON artifact of a finished run (`reviewloop run --trace-out`).
//!
//! Written once after the loop stops; nothing reads it back.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{RunRequest, SharedState, StopReason, TraceEntry};

/// Everything a reader needs to replay a run by eye.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord<'a> {
    pub request: &'a RunRequest,
    pub stop: StopReason,
    pub steps_executed: u32,
    pub trace: &'a [TraceEntry],
    pub final_state: &'a SharedState,
}

/// Write `record` as pretty JSON with a trailing newline, creating parent dirs.
pub fn write_run_record(path: &Path, record: &RunRecord<'_>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create trace dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(record).context("serialize run record")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
