//! Read-only version report for `supervisor check`.

use serde::Serialize;

use crate::core::version::VersionMarker;
use crate::error::SupervisorError;
use crate::exit_codes;
use crate::io::remote_sync::RemoteSync;
use crate::io::version_source::{MarkerLocation, VersionSource};
use crate::reconcile::resolve_versions;

/// Versions and decision, without acting on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    pub remote: String,
    pub branch: String,
    pub local_version: VersionMarker,
    pub remote_version: VersionMarker,
    pub update_required: bool,
}

impl VersionReport {
    pub fn exit_code(&self) -> i32 {
        if self.update_required {
            exit_codes::UPDATE_AVAILABLE
        } else {
            exit_codes::OK
        }
    }

    pub fn render(&self) -> String {
        let verdict = if self.update_required {
            "update available"
        } else {
            "up to date"
        };
        format!(
            "local={} remote={} ({}/{}): {verdict}",
            self.local_version, self.remote_version, self.remote, self.branch
        )
    }
}

/// Fetch and compare versions. Never merges, installs, or launches anything.
pub fn check_versions<V: VersionSource, S: RemoteSync>(
    local: &V,
    sync: &S,
    remote: &str,
    branch: &str,
    marker: &MarkerLocation,
) -> Result<VersionReport, SupervisorError> {
    let versions = resolve_versions(local, sync, branch, marker)?;
    Ok(VersionReport {
        remote: remote.to_string(),
        branch: branch.to_string(),
        local_version: versions.local,
        remote_version: versions.remote,
        update_required: versions.decision().is_update_required(),
    })
}
