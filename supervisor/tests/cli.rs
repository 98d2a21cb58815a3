//! End-to-end runs of the `supervisor` binary against fixture repositories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use supervisor::test_support::{GitFixture, MARKER_PATH, marker_source};

fn supervisor(repo: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_supervisor"))
        .arg("--repo")
        .arg(repo)
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("run supervisor")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

/// Untracked config that swaps the Python toolchain for `sh` scripts.
fn install_shell_worker(fixture: &GitFixture, worker_exit: i32) {
    fixture
        .write_local(
            "supervisor.toml",
            "[install]\n\
             command = [\"sh\", \"-c\", \"echo installed >> install.log\"]\n\
             \n\
             [worker]\n\
             interpreter = \"sh\"\n\
             entry = \"worker.sh\"\n",
        )
        .expect("config");
    fixture
        .write_local(
            "worker.sh",
            &format!("printf '%s\\n' \"$*\" >> worker.log\nexit {worker_exit}\n"),
        )
        .expect("worker script");
}

#[test]
fn check_reports_up_to_date() {
    let fixture = GitFixture::new("5").expect("fixture");
    let out = supervisor(&fixture.local, &["check"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert_eq!(
        stdout(&out).trim(),
        "local=5 remote=5 (origin/main): up to date"
    );
}

#[test]
fn check_reports_pending_update_without_applying_it() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    let head = fixture.local_head().expect("head");

    let out = supervisor(&fixture.local, &["check", "--json"]);
    assert_eq!(out.status.code(), Some(2), "stderr: {}", stderr(&out));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(report["local_version"], 5);
    assert_eq!(report["remote_version"], 6);
    assert_eq!(report["update_required"], true);
    assert_eq!(report["branch"], "main");

    assert_eq!(fixture.local_head().expect("head"), head);
    assert_eq!(
        fixture.read_local(MARKER_PATH).expect("marker"),
        marker_source("5")
    );
}

#[test]
fn check_fails_when_local_marker_is_missing() {
    let fixture = GitFixture::new("5").expect("fixture");
    fs::remove_file(fixture.local.join(MARKER_PATH)).expect("remove marker");

    let out = supervisor(&fixture.local, &["check"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(
        stderr(&out).contains("local version unavailable"),
        "stderr: {}",
        stderr(&out)
    );
}

#[test]
fn invalid_config_is_rejected() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture
        .write_local("supervisor.toml", "[install]\npolicy = \"ignore\"\n")
        .expect("config");
    let out = supervisor(&fixture.local, &["check"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("supervisor.toml"), "stderr: {}", stderr(&out));
}

#[cfg(unix)]
#[test]
fn run_launches_worker_and_propagates_its_exit_code() {
    let fixture = GitFixture::new("5").expect("fixture");
    install_shell_worker(&fixture, 4);

    let out = supervisor(&fixture.local, &["run", "--miner-type", "loss"]);
    assert_eq!(out.status.code(), Some(4), "stderr: {}", stderr(&out));
    assert_eq!(
        fixture.read_local("worker.log").expect("worker ran"),
        "--miner_type loss\n"
    );
    assert!(!fixture.local.join("install.log").exists());
}

#[cfg(unix)]
#[test]
fn run_updates_reinstalls_and_restarts_into_worker() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    install_shell_worker(&fixture, 0);

    let out = supervisor(&fixture.local, &["run", "--miner-type", "loss"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));

    assert_eq!(
        fixture.read_local(MARKER_PATH).expect("marker"),
        marker_source("6")
    );
    assert_eq!(
        fixture.read_local("install.log").expect("installed"),
        "installed\n"
    );
    // The restarted supervisor saw matching versions and ran the worker once.
    assert_eq!(
        fixture.read_local("worker.log").expect("worker ran"),
        "--miner_type loss\n"
    );
}

#[cfg(unix)]
#[test]
fn run_with_diverged_history_fails_without_starting_worker() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    fixture.diverge_local("7").expect("diverge");
    install_shell_worker(&fixture, 0);

    let out = supervisor(&fixture.local, &["run"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("git merge failed"), "stderr: {}", stderr(&out));
    assert!(!fixture.local.join("worker.log").exists());
    assert!(!fixture.local.join("install.log").exists());
}

#[cfg(unix)]
#[test]
fn run_with_local_ahead_of_remote_fails_instead_of_restarting() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.diverge_local("7").expect("local commit");
    install_shell_worker(&fixture, 0);
    let head = fixture.local_head().expect("head");

    let out = supervisor(&fixture.local, &["run"]);
    assert_eq!(out.status.code(), Some(1), "stderr: {}", stderr(&out));
    assert!(
        stderr(&out).contains("merge left local marker at 7, remote is 5"),
        "stderr: {}",
        stderr(&out)
    );
    assert_eq!(fixture.local_head().expect("head"), head);
    assert!(!fixture.local.join("install.log").exists());
    assert!(!fixture.local.join("worker.log").exists());
}
