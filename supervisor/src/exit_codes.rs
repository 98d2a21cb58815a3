//! Stable exit codes for supervisor CLI commands.
//!
//! When the worker runs, its own exit code is passed through unchanged.

/// Cycle finished: worker exited cleanly, or `check` found nothing to update.
pub const OK: i32 = 0;
/// Any supervisor failure (version lookup, git, install, relaunch, config).
pub const FAILURE: i32 = 1;
/// `supervisor check` found a version mismatch.
pub const UPDATE_AVAILABLE: i32 = 2;
