//! I/O helpers for the controller: generation backends, config, prompts.

pub mod config;
pub mod generation;
pub mod process;
pub mod prompt;
pub mod trace_log;
