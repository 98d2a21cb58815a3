//! Self-updating worker supervisor.
//!
//! `supervisor run` checks the version marker in the working copy against the
//! remote branch. On a match it runs the worker and exits with the worker's
//! status; on a mismatch it pulls, reinstalls dependencies, and re-executes
//! itself with the same arguments.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use supervisor::check::check_versions;
use supervisor::core::cycle::InstallPolicy;
use supervisor::error::SupervisorError;
use supervisor::exit_codes;
use supervisor::io::config::{DEFAULT_CONFIG_FILE, SupervisorConfig, load_config};
use supervisor::io::git::Git;
use supervisor::io::installer::CommandInstaller;
use supervisor::io::invocation::ProcessInvocation;
use supervisor::io::relaunch::ExecReplacer;
use supervisor::io::remote_sync::GitRemoteSync;
use supervisor::io::version_source::{LocalVersionSource, MarkerLocation};
use supervisor::io::worker::{ProcessWorkerLauncher, WorkerSpec};
use supervisor::logging;
use supervisor::reconcile::{CycleConfig, CycleInvocations, RepositoryReference, UpdateExecutor};

#[derive(Parser)]
#[command(
    name = "supervisor",
    version,
    about = "Self-updating supervisor for a long-running worker"
)]
struct Cli {
    /// Working copy to supervise (defaults to the current directory).
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Config file (defaults to `<repo>/supervisor.toml`; missing file uses defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Remote branch to track, overriding `repo.branch`.
    #[arg(long, global = true)]
    branch: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one reconciliation cycle: update and restart, or launch the worker.
    Run(RunArgs),
    /// Compare local and remote versions without changing anything.
    Check {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// What to do when dependency installation fails: warn or fatal.
    #[arg(long)]
    install_policy: Option<InstallPolicy>,

    /// Strategy selector forwarded to the worker as `--miner_type`.
    #[arg(long)]
    miner_type: Option<String>,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            err.downcast_ref::<SupervisorError>()
                .map_or(exit_codes::FAILURE, SupervisorError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = match &cli.repo {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
    let mut cfg = load_config(&config_path)?;
    if let Some(branch) = &cli.branch {
        cfg.repo.branch = branch.clone();
    }

    match cli.command {
        Command::Run(args) => {
            if let Some(policy) = args.install_policy {
                cfg.install.policy = policy;
            }
            cfg.validate()?;
            cmd_run(&root, &cfg, args.miner_type.as_deref())
        }
        Command::Check { json } => {
            cfg.validate()?;
            cmd_check(&root, &cfg, json)
        }
    }
}

fn cmd_run(root: &Path, cfg: &SupervisorConfig, miner_type: Option<&str>) -> Result<i32> {
    let relaunch = ProcessInvocation::current().context("resolve supervisor executable")?;
    let worker = WorkerSpec {
        root: root.to_path_buf(),
        interpreter: cfg.worker.interpreter.clone(),
        entry: cfg.worker.entry.clone(),
        args: cfg.worker.args.clone(),
    }
    .with_miner_type(miner_type);

    let executor = UpdateExecutor {
        config: CycleConfig {
            reference: RepositoryReference {
                root: root.to_path_buf(),
                remote: cfg.repo.remote.clone(),
                branch: cfg.repo.branch.clone(),
            },
            marker: marker_location(cfg),
            install_policy: cfg.install.policy,
        },
        local: LocalVersionSource::new(root, marker_location(cfg)),
        sync: remote_sync(root, cfg),
        installer: CommandInstaller {
            workdir: root.to_path_buf(),
            command: cfg.install.command.clone(),
            timeout: cfg.install.timeout_secs.map(std::time::Duration::from_secs),
            output_limit_bytes: cfg.install.output_limit_bytes,
        },
        replacer: ExecReplacer,
        launcher: ProcessWorkerLauncher,
    };

    executor.run_cycle(CycleInvocations {
        relaunch,
        worker: worker.invocation(),
    })?;
    Ok(exit_codes::OK)
}

fn cmd_check(root: &Path, cfg: &SupervisorConfig, json: bool) -> Result<i32> {
    let report = check_versions(
        &LocalVersionSource::new(root, marker_location(cfg)),
        &remote_sync(root, cfg),
        &cfg.repo.remote,
        &cfg.repo.branch,
        &marker_location(cfg),
    )?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize report")?
        );
    } else {
        println!("{}", report.render());
    }
    Ok(report.exit_code())
}

fn marker_location(cfg: &SupervisorConfig) -> MarkerLocation {
    MarkerLocation {
        path: cfg.version.path.clone(),
        name: cfg.version.name.clone(),
    }
}

fn remote_sync(root: &Path, cfg: &SupervisorConfig) -> GitRemoteSync {
    GitRemoteSync::new(Git::new(root), &cfg.repo.remote).require_clean(cfg.repo.require_clean)
}
