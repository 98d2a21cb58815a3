//! Orchestration for a single reconciliation cycle.
//!
//! A cycle compares the local version marker against the remote branch tip and
//! then either launches the worker (versions equal) or pulls, reinstalls
//! dependencies, and replaces the running supervisor (versions differ).
//! Side effects run strictly in order: fetch, merge, install, replace. The
//! local marker is re-read after the merge and must match the remote one
//! before anything is installed.

use std::path::PathBuf;
use std::process::ExitStatus;

use tracing::{error, info, instrument, warn};

use crate::core::cycle::{CycleState, InstallPolicy};
use crate::core::version::{UpdateDecision, VersionMarker, decide};
use crate::error::{Side, SupervisorError, SyncStage};
use crate::io::installer::DependencyInstaller;
use crate::io::invocation::ProcessInvocation;
use crate::io::relaunch::ProcessReplacer;
use crate::io::remote_sync::{RemoteSync, read_remote_version};
use crate::io::version_source::{MarkerLocation, VersionSource};
use crate::io::worker::WorkerLauncher;

/// Local working copy and the remote branch it tracks. Fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub root: PathBuf,
    pub remote: String,
    pub branch: String,
}

/// Static inputs for a cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub reference: RepositoryReference,
    pub marker: MarkerLocation,
    pub install_policy: InstallPolicy,
}

/// Process invocations a cycle may hand off to. Only one of them is consumed.
#[derive(Debug, Clone)]
pub struct CycleInvocations {
    /// The supervisor itself, with its original arguments.
    pub relaunch: ProcessInvocation,
    pub worker: ProcessInvocation,
}

/// Both markers, read in the same cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVersions {
    pub local: VersionMarker,
    pub remote: VersionMarker,
}

impl ResolvedVersions {
    pub fn decision(&self) -> UpdateDecision {
        decide(self.local, self.remote)
    }
}

/// How a cycle ended when it returned normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Versions matched and the worker exited successfully.
    WorkerExited {
        version: VersionMarker,
        status: ExitStatus,
    },
    /// The replacer returned control after taking over. Only test replacers do this.
    Restarted {
        from: VersionMarker,
        to: VersionMarker,
    },
}

/// Result of a cycle, with the states it passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub states: Vec<CycleState>,
}

/// Drives one reconciliation cycle over its collaborators.
pub struct UpdateExecutor<V, S, I, P, W> {
    pub config: CycleConfig,
    pub local: V,
    pub sync: S,
    pub installer: I,
    pub replacer: P,
    pub launcher: W,
}

impl<V, S, I, P, W> UpdateExecutor<V, S, I, P, W>
where
    V: VersionSource,
    S: RemoteSync,
    I: DependencyInstaller,
    P: ProcessReplacer,
    W: WorkerLauncher,
{
    /// Run one cycle. Failures are logged with the state they happened in and returned.
    #[instrument(skip_all, fields(branch = %self.config.reference.branch))]
    pub fn run_cycle(
        &self,
        invocations: CycleInvocations,
    ) -> Result<CycleReport, SupervisorError> {
        let mut trace = StateTrace::new();
        match self.drive(&mut trace, invocations) {
            Ok(outcome) => Ok(CycleReport {
                outcome,
                states: trace.states,
            }),
            Err(err) => {
                let stage = trace.current();
                trace.advance(CycleState::Failed);
                error!(%stage, err = %err, "reconciliation cycle failed");
                Err(err)
            }
        }
    }

    /// Read the local marker, then fetch and read the remote one.
    ///
    /// The local read comes first so a broken local tree fails before any network I/O.
    pub fn resolve_versions(&self) -> Result<ResolvedVersions, SupervisorError> {
        resolve_versions(
            &self.local,
            &self.sync,
            &self.config.reference.branch,
            &self.config.marker,
        )
    }

    fn drive(
        &self,
        trace: &mut StateTrace,
        invocations: CycleInvocations,
    ) -> Result<CycleOutcome, SupervisorError> {
        let versions = self.resolve_versions()?;
        trace.advance(CycleState::VersionsResolved);
        info!(local = %versions.local, remote = %versions.remote, "versions resolved");

        match versions.decision() {
            UpdateDecision::UpToDate { version } => {
                trace.advance(CycleState::UpToDate);
                trace.advance(CycleState::LaunchingWorker);
                let status = self.launcher.launch(invocations.worker)?;
                if !status.success() {
                    return Err(SupervisorError::WorkerExit {
                        code: status.code(),
                    });
                }
                Ok(CycleOutcome::WorkerExited { version, status })
            }
            UpdateDecision::UpdateRequired { local, remote } => {
                trace.advance(CycleState::UpdateRequired);
                info!(
                    %local,
                    %remote,
                    branch = %self.config.reference.branch,
                    "update required"
                );
                self.sync.merge_remote(&self.config.reference.branch)?;
                self.confirm_merged(remote)?;
                trace.advance(CycleState::Synced);

                self.install_dependencies()?;
                trace.advance(CycleState::DependenciesInstalled);

                trace.advance(CycleState::Restarting);
                self.replacer.replace_self(invocations.relaunch)?;
                Ok(CycleOutcome::Restarted {
                    from: local,
                    to: remote,
                })
            }
        }
    }

    /// Re-read the local marker after a merge; it must now equal the remote one.
    ///
    /// Fails when the pull changed nothing, e.g. a local tree ahead of the remote.
    fn confirm_merged(&self, remote: VersionMarker) -> Result<(), SupervisorError> {
        let merged = self
            .local
            .local_version()
            .map_err(|source| SupervisorError::VersionUnavailable {
                side: Side::Local,
                source,
            })?;
        if merged != remote {
            return Err(SupervisorError::sync(
                SyncStage::Merge,
                format!("merge left local marker at {merged}, remote is {remote}"),
            ));
        }
        Ok(())
    }

    fn install_dependencies(&self) -> Result<(), SupervisorError> {
        match self.installer.install() {
            Ok(()) => Ok(()),
            Err(err) => match self.config.install_policy {
                InstallPolicy::Warn => {
                    warn!(err = %err, "dependency install failed; restarting anyway");
                    Ok(())
                }
                InstallPolicy::Fatal => Err(err),
            },
        }
    }
}

/// Resolve both markers. Shared by cycles and `supervisor check`.
pub fn resolve_versions<V: VersionSource, S: RemoteSync>(
    local: &V,
    sync: &S,
    branch: &str,
    marker: &MarkerLocation,
) -> Result<ResolvedVersions, SupervisorError> {
    let local = local
        .local_version()
        .map_err(|source| SupervisorError::VersionUnavailable {
            side: Side::Local,
            source,
        })?;
    sync.fetch_remote_metadata()?;
    let remote = read_remote_version(sync, branch, marker)?;
    Ok(ResolvedVersions { local, remote })
}

/// Ordered record of the states a cycle entered.
#[derive(Debug)]
struct StateTrace {
    states: Vec<CycleState>,
}

impl StateTrace {
    fn new() -> Self {
        Self {
            states: vec![CycleState::Start],
        }
    }

    fn current(&self) -> CycleState {
        self.states.last().copied().unwrap_or(CycleState::Start)
    }

    fn advance(&mut self, next: CycleState) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "illegal cycle transition {current} -> {next}"
        );
        info!(from = %current, to = %next, "cycle transition");
        self.states.push(next);
    }
}
