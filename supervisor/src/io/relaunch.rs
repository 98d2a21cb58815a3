//! Replacing the running supervisor with a fresh invocation of itself.
//!
//! On unix the process image is replaced in place with `exec`: same pid, same
//! parent, no second instance. Elsewhere the new invocation runs as a child
//! and the parent exits with its status once it finishes.

use tracing::{error, info};

use crate::error::SupervisorError;
use crate::io::invocation::ProcessInvocation;

pub trait ProcessReplacer {
    /// Hand execution over to `invocation`.
    ///
    /// Real implementations only return on failure.
    fn replace_self(&self, invocation: ProcessInvocation) -> Result<(), SupervisorError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecReplacer;

impl ProcessReplacer for ExecReplacer {
    fn replace_self(&self, invocation: ProcessInvocation) -> Result<(), SupervisorError> {
        let program = invocation.program.clone();
        info!(
            program = %program.display(),
            args = ?invocation.args,
            "restarting with updated code"
        );
        let source = replace_image(invocation);
        error!(program = %program.display(), err = %source, "relaunch failed");
        Err(SupervisorError::Relaunch { program, source })
    }
}

#[cfg(unix)]
fn replace_image(invocation: ProcessInvocation) -> std::io::Error {
    use std::os::unix::process::CommandExt;
    invocation.into_command().exec()
}

#[cfg(not(unix))]
fn replace_image(invocation: ProcessInvocation) -> std::io::Error {
    match invocation.into_command().status() {
        Ok(status) => std::process::exit(status.code().unwrap_or(crate::exit_codes::FAILURE)),
        Err(err) => err,
    }
}
