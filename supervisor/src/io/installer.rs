//! Dependency reinstallation after a pull.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::error::SupervisorError;
use crate::io::process::run_command;

pub trait DependencyInstaller {
    fn install(&self) -> Result<(), SupervisorError>;
}

/// Runs a configured command (e.g. `pip install -e .`) in the repository root.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    pub workdir: PathBuf,
    pub command: Vec<String>,
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

impl DependencyInstaller for CommandInstaller {
    #[instrument(skip_all, fields(command = %self.command.join(" ")))]
    fn install(&self) -> Result<(), SupervisorError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(SupervisorError::Install {
                message: "empty install command".to_string(),
            });
        };
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.workdir);

        let output = run_command(cmd, self.timeout, self.output_limit_bytes).map_err(|err| {
            SupervisorError::Install {
                message: format!("{err:#}"),
            }
        })?;

        if output.timed_out {
            warn!("install command timed out");
            return Err(SupervisorError::Install {
                message: format!("timed out after {:?}", self.timeout.unwrap_or_default()),
            });
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "install command failed");
            return Err(SupervisorError::Install {
                message: format!(
                    "exit status {:?}: {}",
                    output.status.code(),
                    output.stderr_lossy()
                ),
            });
        }
        info!("dependencies installed");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn installer(command: &[&str]) -> CommandInstaller {
        CommandInstaller {
            workdir: std::env::temp_dir(),
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout: None,
            output_limit_bytes: 1024,
        }
    }

    #[test]
    fn succeeds_on_zero_exit() {
        installer(&["sh", "-c", "echo installed"])
            .install()
            .expect("install");
    }

    #[test]
    fn reports_stderr_on_failure() {
        let err = installer(&["sh", "-c", "echo 'no matching distribution' >&2; exit 1"])
            .install()
            .expect_err("fail");
        match err {
            SupervisorError::Install { message } => {
                assert!(message.contains("no matching distribution"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_install_error() {
        let err = installer(&["definitely-not-a-real-installer-binary"])
            .install()
            .expect_err("spawn");
        assert!(matches!(err, SupervisorError::Install { .. }));
    }
}
