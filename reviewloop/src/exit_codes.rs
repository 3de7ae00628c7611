//! Stable exit codes for `reviewloop` commands.

/// Command succeeded; for `run`, the reviewer approved the plan.
pub const OK: i32 = 0;
/// Invalid input or config, or any other error.
pub const INVALID: i32 = 1;
/// `reviewloop run` stopped at the turn limit with issues still open.
pub const TURN_LIMIT: i32 = 2;
