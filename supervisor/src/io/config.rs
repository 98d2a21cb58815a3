//! Supervisor configuration stored in `supervisor.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::cycle::InstallPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "supervisor.toml";

/// Supervisor configuration (TOML).
///
/// Missing fields default to the values used by the miner repository layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SupervisorConfig {
    pub repo: RepoConfig,
    pub version: VersionConfig,
    pub install: InstallConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepoConfig {
    /// Remote to fetch and pull from.
    pub remote: String,
    /// Branch whose tip is compared against the local tree.
    pub branch: String,
    /// Refuse to pull when tracked files have local modifications.
    pub require_clean: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            require_clean: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersionConfig {
    /// Path of the file carrying the marker, relative to the repository root.
    pub path: String,
    /// Name of the marker declaration.
    pub name: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            path: "dml/chain/__init__.py".to_string(),
            name: "__spec_version__".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallConfig {
    /// Command run in the repository root after a successful pull.
    pub command: Vec<String>,
    pub policy: InstallPolicy,
    /// Kill the install command after this many seconds. Unset waits forever.
    pub timeout_secs: Option<u64>,
    /// Keep at most this many bytes of install stdout/stderr.
    pub output_limit_bytes: usize,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            command: ["pip", "install", "-e", "."]
                .into_iter()
                .map(String::from)
                .collect(),
            policy: InstallPolicy::Warn,
            timeout_secs: None,
            output_limit_bytes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    pub interpreter: String,
    /// Entry script, relative to the repository root.
    pub entry: String,
    pub args: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            entry: "neurons/miner.py".to_string(),
            args: Vec::new(),
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repo.remote.trim().is_empty() {
            return Err(anyhow!("repo.remote must be non-empty"));
        }
        if self.repo.branch.trim().is_empty() {
            return Err(anyhow!("repo.branch must be non-empty"));
        }
        if self.version.path.trim().is_empty() {
            return Err(anyhow!("version.path must be non-empty"));
        }
        if self.version.name.trim().is_empty() {
            return Err(anyhow!("version.name must be non-empty"));
        }
        if self.install.command.is_empty() || self.install.command[0].trim().is_empty() {
            return Err(anyhow!("install.command must be a non-empty array"));
        }
        if self.install.timeout_secs == Some(0) {
            return Err(anyhow!("install.timeout_secs must be > 0 when set"));
        }
        if self.install.output_limit_bytes == 0 {
            return Err(anyhow!("install.output_limit_bytes must be > 0"));
        }
        if self.worker.interpreter.trim().is_empty() {
            return Err(anyhow!("worker.interpreter must be non-empty"));
        }
        if self.worker.entry.trim().is_empty() {
            return Err(anyhow!("worker.entry must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SupervisorConfig::default()`.
pub fn load_config(path: &Path) -> Result<SupervisorConfig> {
    if !path.exists() {
        let cfg = SupervisorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SupervisorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
