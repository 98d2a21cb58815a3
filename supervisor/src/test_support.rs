//! Test-only helpers: scripted cycle collaborators and git fixture repositories.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::cycle::InstallPolicy;
use crate::core::version::{VersionMarker, parse_marker};
use crate::error::{SupervisorError, SyncStage, VersionError};
use crate::io::installer::DependencyInstaller;
use crate::io::invocation::ProcessInvocation;
use crate::io::relaunch::ProcessReplacer;
use crate::io::remote_sync::RemoteSync;
use crate::io::version_source::{MarkerLocation, VersionSource};
use crate::io::worker::WorkerLauncher;
use crate::reconcile::{CycleConfig, CycleInvocations, RepositoryReference, UpdateExecutor};

pub const MARKER_PATH: &str = "dml/chain/__init__.py";
pub const MARKER_NAME: &str = "__spec_version__";

/// Contents of a marker file declaring `version` among unrelated lines.
pub fn marker_source(version: &str) -> String {
    format!(
        "\"\"\"Chain helpers.\"\"\"\n\
         import os\n\
         \n\
         __version__ = \"0.4.1\"\n\
         __spec_version__ = \"{version}\"\n\
         \n\
         NETUID = int(os.environ.get(\"NETUID\", \"1\"))\n"
    )
}

pub fn marker_location() -> MarkerLocation {
    MarkerLocation {
        path: MARKER_PATH.to_string(),
        name: MARKER_NAME.to_string(),
    }
}

/// Portable constructor for a child exit status with `code`.
pub fn exit_status(code: i32) -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(code as u32)
    }
}

/// A collaborator call observed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LocalVersion,
    Fetch,
    ReadRemote { branch: String, path: String },
    Merge { branch: String },
    Install,
    Relaunch(ProcessInvocation),
    LaunchWorker(ProcessInvocation),
}

/// Shared, ordered call log for all scripted collaborators of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub fn record(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|call| pred(*call)).count()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.0.borrow().iter().position(pred)
    }
}

/// In-memory marker file contents shared by the scripted local tree and remote.
/// `None` means the file is missing.
pub type SharedContents = Rc<RefCell<Option<String>>>;

/// Local marker backed by in-memory file contents.
pub struct ScriptedVersionSource {
    pub log: CallLog,
    pub contents: SharedContents,
}

impl VersionSource for ScriptedVersionSource {
    fn local_version(&self) -> Result<VersionMarker, VersionError> {
        self.log.record(Call::LocalVersion);
        let path = PathBuf::from(MARKER_PATH);
        let stored = self.contents.borrow();
        let Some(contents) = stored.as_deref() else {
            return Err(VersionError::NotFound {
                path,
                what: "version file".to_string(),
            });
        };
        parse_marker(contents, MARKER_NAME)
            .map_err(|err| VersionError::from_local_parse(path, err))
    }
}

/// Remote with scripted marker file contents and failure switches.
///
/// A successful merge copies the remote contents into `local` unless
/// `merge_applies` is false, which models a pull that finds nothing to do.
pub struct ScriptedRemote {
    pub log: CallLog,
    pub contents: Option<String>,
    pub local: SharedContents,
    pub fetch_fails: bool,
    pub merge_fails: bool,
    pub merge_applies: bool,
}

impl RemoteSync for ScriptedRemote {
    fn fetch_remote_metadata(&self) -> Result<(), SupervisorError> {
        self.log.record(Call::Fetch);
        if self.fetch_fails {
            return Err(SupervisorError::sync(
                SyncStage::Fetch,
                "could not resolve host",
            ));
        }
        Ok(())
    }

    fn read_remote_file(&self, branch: &str, path: &str) -> Result<String, SupervisorError> {
        self.log.record(Call::ReadRemote {
            branch: branch.to_string(),
            path: path.to_string(),
        });
        self.contents.clone().ok_or_else(|| {
            SupervisorError::sync(
                SyncStage::Read,
                format!("path '{path}' does not exist in 'origin/{branch}'"),
            )
        })
    }

    fn merge_remote(&self, branch: &str) -> Result<(), SupervisorError> {
        self.log.record(Call::Merge {
            branch: branch.to_string(),
        });
        if self.merge_fails {
            return Err(SupervisorError::sync(
                SyncStage::Merge,
                "Not possible to fast-forward, aborting.",
            ));
        }
        if self.merge_applies {
            *self.local.borrow_mut() = self.contents.clone();
        }
        Ok(())
    }
}

pub struct ScriptedInstaller {
    pub log: CallLog,
    pub fails: bool,
}

impl DependencyInstaller for ScriptedInstaller {
    fn install(&self) -> Result<(), SupervisorError> {
        self.log.record(Call::Install);
        if self.fails {
            return Err(SupervisorError::Install {
                message: "exit status Some(1): no matching distribution".to_string(),
            });
        }
        Ok(())
    }
}

/// Records the relaunch instead of replacing the test process.
pub struct RecordingReplacer {
    pub log: CallLog,
    pub fails: bool,
}

impl ProcessReplacer for RecordingReplacer {
    fn replace_self(&self, invocation: ProcessInvocation) -> Result<(), SupervisorError> {
        let program = invocation.program.clone();
        self.log.record(Call::Relaunch(invocation));
        if self.fails {
            return Err(SupervisorError::Relaunch {
                program,
                source: io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
        Ok(())
    }
}

pub struct ScriptedWorker {
    pub log: CallLog,
    pub exit_code: i32,
}

impl WorkerLauncher for ScriptedWorker {
    fn launch(&self, invocation: ProcessInvocation) -> Result<ExitStatus, SupervisorError> {
        self.log.record(Call::LaunchWorker(invocation));
        Ok(exit_status(self.exit_code))
    }
}

pub type ScriptedExecutor = UpdateExecutor<
    ScriptedVersionSource,
    ScriptedRemote,
    ScriptedInstaller,
    RecordingReplacer,
    ScriptedWorker,
>;

/// Knobs for a scripted reconciliation cycle.
#[derive(Debug, Clone)]
pub struct CycleHarness {
    pub log: CallLog,
    pub local: Option<String>,
    pub remote: Option<String>,
    pub fetch_fails: bool,
    pub merge_fails: bool,
    /// False when a merge succeeds without changing the local tree.
    pub merge_applies: bool,
    pub install_fails: bool,
    pub relaunch_fails: bool,
    pub worker_exit_code: i32,
    pub install_policy: InstallPolicy,
}

impl CycleHarness {
    /// Harness whose local and remote marker files declare the given values.
    pub fn new(local: &str, remote: &str) -> Self {
        Self {
            log: CallLog::default(),
            local: Some(marker_source(local)),
            remote: Some(marker_source(remote)),
            fetch_fails: false,
            merge_fails: false,
            merge_applies: true,
            install_fails: false,
            relaunch_fails: false,
            worker_exit_code: 0,
            install_policy: InstallPolicy::Warn,
        }
    }

    pub fn executor(&self) -> ScriptedExecutor {
        let local = Rc::new(RefCell::new(self.local.clone()));
        UpdateExecutor {
            config: CycleConfig {
                reference: RepositoryReference {
                    root: PathBuf::from("/srv/miner"),
                    remote: "origin".to_string(),
                    branch: "main".to_string(),
                },
                marker: marker_location(),
                install_policy: self.install_policy,
            },
            local: ScriptedVersionSource {
                log: self.log.clone(),
                contents: Rc::clone(&local),
            },
            sync: ScriptedRemote {
                log: self.log.clone(),
                contents: self.remote.clone(),
                local,
                fetch_fails: self.fetch_fails,
                merge_fails: self.merge_fails,
                merge_applies: self.merge_applies,
            },
            installer: ScriptedInstaller {
                log: self.log.clone(),
                fails: self.install_fails,
            },
            replacer: RecordingReplacer {
                log: self.log.clone(),
                fails: self.relaunch_fails,
            },
            launcher: ScriptedWorker {
                log: self.log.clone(),
                exit_code: self.worker_exit_code,
            },
        }
    }
}

/// Invocations as `supervisor run --miner-type loss` would build them.
pub fn sample_invocations() -> CycleInvocations {
    CycleInvocations {
        relaunch: ProcessInvocation::from_argv(
            "/usr/local/bin/supervisor",
            ["supervisor", "run", "--miner-type", "loss"].map(OsString::from),
        ),
        worker: ProcessInvocation::new("python3")
            .arg("neurons/miner.py")
            .args(["--miner_type", "loss"])
            .workdir("/srv/miner"),
    }
}

/// Bare `origin` plus two clones: `publisher` pushes releases, `local` is supervised.
pub struct GitFixture {
    _temp: TempDir,
    pub origin: PathBuf,
    pub publisher: PathBuf,
    pub local: PathBuf,
}

impl GitFixture {
    /// Publish `initial_version` on `origin/main` and clone it as the local working copy.
    pub fn new(initial_version: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let origin = temp.path().join("origin.git");
        let publisher = temp.path().join("publisher");
        let local = temp.path().join("local");

        git(temp.path(), &["init", "--quiet", "--bare", "-b", "main", "origin.git"])?;
        git(temp.path(), &["init", "--quiet", "-b", "main", "publisher"])?;
        git(&publisher, &["remote", "add", "origin", path_str(&origin)?])?;

        write_file(&publisher, MARKER_PATH, &marker_source(initial_version))?;
        write_file(
            &publisher,
            "neurons/miner.py",
            "print(\"Best genome fitness: 0.0000\")\n",
        )?;
        commit_all(&publisher, &format!("release {initial_version}"))?;
        git(&publisher, &["push", "--quiet", "-u", "origin", "main"])?;

        git(temp.path(), &["clone", "--quiet", path_str(&origin)?, "local"])?;

        Ok(Self {
            _temp: temp,
            origin,
            publisher,
            local,
        })
    }

    /// Commit and push a new marker value from the publisher clone.
    pub fn publish_version(&self, version: &str) -> Result<()> {
        write_file(&self.publisher, MARKER_PATH, &marker_source(version))?;
        commit_all(&self.publisher, &format!("release {version}"))?;
        git(&self.publisher, &["push", "--quiet", "origin", "main"])
    }

    /// Commit a conflicting marker change in the local clone so it diverges from origin.
    pub fn diverge_local(&self, version: &str) -> Result<()> {
        write_file(&self.local, MARKER_PATH, &marker_source(version))?;
        commit_all(&self.local, &format!("local hotfix {version}"))
    }

    pub fn local_head(&self) -> Result<String> {
        git_capture(&self.local, &["rev-parse", "HEAD"])
    }

    pub fn read_local(&self, rel: &str) -> Result<String> {
        let path = self.local.join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn write_local(&self, rel: &str, contents: &str) -> Result<()> {
        write_file(&self.local, rel, contents)
    }
}

fn write_file(root: &Path, rel: &str, contents: &str) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
}

fn commit_all(dir: &Path, message: &str) -> Result<()> {
    git(dir, &["add", "-A"])?;
    git(
        dir,
        &[
            "-c",
            "user.name=Release Bot",
            "-c",
            "user.email=release@example.com",
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "-m",
            message,
        ],
    )
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("non-utf8 path {}", path.display()))
}

fn git(dir: &Path, args: &[&str]) -> Result<()> {
    git_capture(dir, args).map(|_| ())
}

fn git_capture(dir: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !out.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
