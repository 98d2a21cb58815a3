//! Self-updating supervisor for a long-running worker process.
//!
//! Each invocation runs one reconciliation cycle: compare the version marker
//! in the local working copy with the one on the remote branch, then either
//! launch the worker or pull, reinstall dependencies, and restart under the
//! updated code. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (marker parsing, update decision,
//!   cycle states). No I/O.
//! - **[`io`]**: Side-effecting adapters (git, files, child processes, exec),
//!   each behind a trait so cycles can be driven by scripted fakes in tests.
//!
//! [`reconcile`] and [`check`] coordinate the two to implement CLI commands.

pub mod check;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod reconcile;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
