//! Running the worker as a child process.

use std::path::PathBuf;
use std::process::ExitStatus;

use tracing::{info, instrument};

use crate::error::SupervisorError;
use crate::io::invocation::ProcessInvocation;

pub trait WorkerLauncher {
    /// Start the worker, block until it exits, and return its status unmodified.
    fn launch(&self, invocation: ProcessInvocation) -> Result<ExitStatus, SupervisorError>;
}

/// Worker command line: `<interpreter> <entry> [args...]`, run from the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub root: PathBuf,
    pub interpreter: String,
    pub entry: String,
    pub args: Vec<String>,
}

impl WorkerSpec {
    /// Append the worker's strategy selector (`--miner_type <kind>`).
    pub fn with_miner_type(mut self, miner_type: Option<&str>) -> Self {
        if let Some(kind) = miner_type {
            self.args.push("--miner_type".to_string());
            self.args.push(kind.to_string());
        }
        self
    }

    pub fn invocation(&self) -> ProcessInvocation {
        ProcessInvocation::new(&self.interpreter)
            .arg(&self.entry)
            .args(&self.args)
            .workdir(&self.root)
    }
}

/// Spawns the worker with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessWorkerLauncher;

impl WorkerLauncher for ProcessWorkerLauncher {
    #[instrument(skip_all, fields(program = %invocation.program.display()))]
    fn launch(&self, invocation: ProcessInvocation) -> Result<ExitStatus, SupervisorError> {
        let program = invocation.program.clone();
        info!(args = ?invocation.args, "launching worker");
        let status = invocation
            .into_command()
            .status()
            .map_err(|source| SupervisorError::WorkerSpawn { program, source })?;
        info!(exit_code = ?status.code(), "worker exited");
        Ok(status)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use super::*;

    fn spec(root: &std::path::Path, script: &str) -> WorkerSpec {
        fs::create_dir_all(root.join("neurons")).expect("mkdir");
        fs::write(root.join("neurons/miner.sh"), script).expect("write script");
        WorkerSpec {
            root: root.to_path_buf(),
            interpreter: "sh".to_string(),
            entry: "neurons/miner.sh".to_string(),
            args: Vec::new(),
        }
    }

    #[test]
    fn returns_exit_status_unmodified() {
        let temp = tempfile::tempdir().expect("tempdir");
        let spec = spec(temp.path(), "exit 7\n");
        let status = ProcessWorkerLauncher
            .launch(spec.invocation())
            .expect("launch");
        assert_eq!(status.code(), Some(7));
    }

    #[test]
    fn runs_from_repository_root_with_selector() {
        let temp = tempfile::tempdir().expect("tempdir");
        let spec = spec(temp.path(), "printf '%s\\n' \"$*\" > args.txt\n")
            .with_miner_type(Some("simple"));
        let status = ProcessWorkerLauncher
            .launch(spec.invocation())
            .expect("launch");
        assert!(status.success());
        let args = fs::read_to_string(temp.path().join("args.txt")).expect("args written");
        assert_eq!(args.trim(), "--miner_type simple");
    }

    #[test]
    fn missing_interpreter_is_spawn_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut spec = spec(temp.path(), "exit 0\n");
        spec.interpreter = "definitely-not-an-interpreter".to_string();
        let err = ProcessWorkerLauncher
            .launch(spec.invocation())
            .expect_err("spawn");
        assert!(matches!(err, SupervisorError::WorkerSpawn { .. }));
    }

    #[test]
    fn no_selector_leaves_args_untouched() {
        let spec = WorkerSpec {
            root: PathBuf::from("."),
            interpreter: "python3".to_string(),
            entry: "neurons/miner.py".to_string(),
            args: vec!["--netuid".to_string(), "1".to_string()],
        }
        .with_miner_type(None);
        assert_eq!(spec.args, vec!["--netuid", "1"]);
    }
}
