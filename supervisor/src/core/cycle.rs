//! Reconciliation cycle states and policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// States a reconciliation cycle moves through.
///
/// ```text
/// Start -> VersionsResolved -> UpToDate -> LaunchingWorker
///                           -> UpdateRequired -> Synced -> DependenciesInstalled -> Restarting
/// ```
///
/// Any state may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Start,
    VersionsResolved,
    UpToDate,
    UpdateRequired,
    Synced,
    DependenciesInstalled,
    Restarting,
    LaunchingWorker,
    Failed,
}

impl CycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleState::Start => "start",
            CycleState::VersionsResolved => "versions_resolved",
            CycleState::UpToDate => "up_to_date",
            CycleState::UpdateRequired => "update_required",
            CycleState::Synced => "synced",
            CycleState::DependenciesInstalled => "dependencies_installed",
            CycleState::Restarting => "restarting",
            CycleState::LaunchingWorker => "launching_worker",
            CycleState::Failed => "failed",
        }
    }

    /// True if `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: CycleState) -> bool {
        use CycleState as S;
        if next == S::Failed {
            return !matches!(self, S::Failed);
        }
        matches!(
            (self, next),
            (S::Start, S::VersionsResolved)
                | (S::VersionsResolved, S::UpToDate)
                | (S::VersionsResolved, S::UpdateRequired)
                | (S::UpdateRequired, S::Synced)
                | (S::Synced, S::DependenciesInstalled)
                | (S::DependenciesInstalled, S::Restarting)
                | (S::UpToDate, S::LaunchingWorker)
        )
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when dependency installation fails after a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPolicy {
    /// Log a warning and restart anyway.
    #[default]
    Warn,
    /// Abort the cycle without restarting.
    Fatal,
}

impl FromStr for InstallPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warn" => Ok(InstallPolicy::Warn),
            "fatal" => Ok(InstallPolicy::Fatal),
            other => Err(format!(
                "unknown install policy '{other}' (expected warn|fatal)"
            )),
        }
    }
}
