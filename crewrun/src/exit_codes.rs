//! Stable exit codes for crewrun CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid definition or config, or another error outside a run.
pub const INVALID: i32 = 1;
/// A task failed (provider, unresolved reference, storage).
pub const FAILED: i32 = 2;
/// A quality gate exceeded its revision budget.
pub const REVISION_LIMIT: i32 = 3;
/// The run was interrupted.
pub const CANCELLED: i32 = 4;
