//! Error taxonomy for a reconciliation cycle.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::version::MarkerParseError;
use crate::exit_codes;

/// Which tree a version lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Remote => f.write_str("remote"),
        }
    }
}

/// Remote-repository step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetch,
    Read,
    Merge,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStage::Fetch => f.write_str("fetch"),
            SyncStage::Read => f.write_str("read"),
            SyncStage::Merge => f.write_str("merge"),
        }
    }
}

/// Failure to obtain a version marker.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("{what} not found in {}", .path.display())]
    NotFound { path: PathBuf, what: String },

    #[error("malformed version marker in {}: {detail}", .path.display())]
    Format { path: PathBuf, detail: String },

    #[error("read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VersionError {
    /// Map a marker parse failure in the local tree: a missing declaration is a lookup miss.
    pub fn from_local_parse(path: PathBuf, err: MarkerParseError) -> Self {
        match err {
            MarkerParseError::Missing { name } => VersionError::NotFound {
                path,
                what: format!("`{name}`"),
            },
            other @ MarkerParseError::NotInteger { .. } => VersionError::Format {
                path,
                detail: other.to_string(),
            },
        }
    }

    /// Map a marker parse failure in remote content: any mismatch is a format problem.
    pub fn from_remote_parse(path: PathBuf, err: MarkerParseError) -> Self {
        VersionError::Format {
            path,
            detail: err.to_string(),
        }
    }
}

/// Failures surfaced by a reconciliation cycle.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{side} version unavailable: {source}")]
    VersionUnavailable {
        side: Side,
        #[source]
        source: VersionError,
    },

    #[error("git {stage} failed: {message}")]
    Sync { stage: SyncStage, message: String },

    #[error("dependency install failed: {message}")]
    Install { message: String },

    #[error("relaunch {} failed: {source}", .program.display())]
    Relaunch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("spawn worker {}: {source}", .program.display())]
    WorkerSpawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker exited with {}", describe_code(.code))]
    WorkerExit { code: Option<i32> },
}

impl SupervisorError {
    pub fn sync(stage: SyncStage, err: impl std::fmt::Display) -> Self {
        SupervisorError::Sync {
            stage,
            message: err.to_string(),
        }
    }

    /// Process exit code for this failure.
    ///
    /// A worker that exited with a code passes it through; everything else is `FAILURE`.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::WorkerExit { code: Some(code) } if *code != 0 => *code,
            _ => exit_codes::FAILURE,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
