//! Remote repository operations used by a reconciliation cycle.
//!
//! The [`RemoteSync`] trait keeps orchestration independent of `git`; tests
//! drive cycles with scripted implementations.

use std::path::PathBuf;

use tracing::{debug, info, instrument};

use crate::core::version::{VersionMarker, parse_marker};
use crate::error::{Side, SupervisorError, SyncStage, VersionError};
use crate::io::git::Git;
use crate::io::version_source::MarkerLocation;

pub trait RemoteSync {
    /// Update knowledge of the remote branch tip. Must not touch the worktree.
    fn fetch_remote_metadata(&self) -> Result<(), SupervisorError>;

    /// Text of `path` as committed at the fetched tip of `branch`. Must not touch the worktree.
    fn read_remote_file(&self, branch: &str, path: &str) -> Result<String, SupervisorError>;

    /// Integrate the remote tip of `branch` into the worktree, or fail without partial changes.
    fn merge_remote(&self, branch: &str) -> Result<(), SupervisorError>;
}

/// [`RemoteSync`] backed by the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitRemoteSync {
    git: Git,
    remote: String,
    require_clean: bool,
}

impl GitRemoteSync {
    pub fn new(git: Git, remote: impl Into<String>) -> Self {
        Self {
            git,
            remote: remote.into(),
            require_clean: false,
        }
    }

    /// Refuse to merge when tracked files carry local modifications.
    pub fn require_clean(mut self, require_clean: bool) -> Self {
        self.require_clean = require_clean;
        self
    }

    fn remote_ref(&self, branch: &str) -> String {
        format!("{}/{branch}", self.remote)
    }
}

impl RemoteSync for GitRemoteSync {
    fn fetch_remote_metadata(&self) -> Result<(), SupervisorError> {
        self.git
            .fetch(&self.remote)
            .map_err(|err| SupervisorError::sync(SyncStage::Fetch, format!("{err:#}")))
    }

    fn read_remote_file(&self, branch: &str, path: &str) -> Result<String, SupervisorError> {
        self.git
            .show_file(&self.remote_ref(branch), path)
            .map_err(|err| SupervisorError::sync(SyncStage::Read, format!("{err:#}")))
    }

    #[instrument(skip_all, fields(branch = %branch))]
    fn merge_remote(&self, branch: &str) -> Result<(), SupervisorError> {
        let merge_err =
            |err: anyhow::Error| SupervisorError::sync(SyncStage::Merge, format!("{err:#}"));
        if self.require_clean {
            self.git.ensure_clean().map_err(merge_err)?;
        }
        let before = self.git.head_short_sha(12).map_err(merge_err)?;
        self.git.pull_ff_only(&self.remote, branch).map_err(merge_err)?;
        let after = self.git.head_short_sha(12).map_err(merge_err)?;
        info!(%before, %after, "merged remote changes");
        Ok(())
    }
}

/// Read and parse the marker from the remote tip of `branch`.
pub fn read_remote_version<S: RemoteSync>(
    sync: &S,
    branch: &str,
    location: &MarkerLocation,
) -> Result<VersionMarker, SupervisorError> {
    let content = sync.read_remote_file(branch, &location.path)?;
    let marker = parse_marker(&content, &location.name).map_err(|err| {
        SupervisorError::VersionUnavailable {
            side: Side::Remote,
            source: VersionError::from_remote_parse(PathBuf::from(&location.path), err),
        }
    })?;
    debug!(branch, path = %location.path, %marker, "read remote version");
    Ok(marker)
}
