//! I/O adapters for supervisor commands.

pub mod config;
pub mod git;
pub mod installer;
pub mod invocation;
pub mod process;
pub mod relaunch;
pub mod remote_sync;
pub mod version_source;
pub mod worker;
