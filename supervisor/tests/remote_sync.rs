//! `GitRemoteSync` and `LocalVersionSource` against real repositories.

use supervisor::core::version::VersionMarker;
use supervisor::error::{SupervisorError, SyncStage};
use supervisor::io::git::Git;
use supervisor::io::remote_sync::{GitRemoteSync, RemoteSync, read_remote_version};
use supervisor::io::version_source::{LocalVersionSource, VersionSource};
use supervisor::reconcile::resolve_versions;
use supervisor::test_support::{GitFixture, MARKER_PATH, marker_location, marker_source};

fn sync_for(fixture: &GitFixture) -> GitRemoteSync {
    GitRemoteSync::new(Git::new(&fixture.local), "origin")
}

fn local_for(fixture: &GitFixture) -> LocalVersionSource {
    LocalVersionSource::new(&fixture.local, marker_location())
}

#[test]
fn fresh_clone_is_up_to_date() {
    let fixture = GitFixture::new("5").expect("fixture");
    let versions =
        resolve_versions(&local_for(&fixture), &sync_for(&fixture), "main", &marker_location())
            .expect("resolve");
    assert_eq!(versions.local, VersionMarker(5));
    assert_eq!(versions.remote, VersionMarker(5));
    assert!(!versions.decision().is_update_required());
}

#[test]
fn fetch_and_read_leave_worktree_untouched() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    let head = fixture.local_head().expect("head");

    let sync = sync_for(&fixture);
    sync.fetch_remote_metadata().expect("fetch");
    let remote = read_remote_version(&sync, "main", &marker_location()).expect("remote");

    assert_eq!(remote, VersionMarker(6));
    assert_eq!(fixture.local_head().expect("head"), head);
    assert_eq!(
        fixture.read_local(MARKER_PATH).expect("read"),
        marker_source("5")
    );
    assert_eq!(
        local_for(&fixture).local_version().expect("local"),
        VersionMarker(5)
    );
}

#[test]
fn remote_read_before_fetch_sees_stale_tip() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");

    let stale = read_remote_version(&sync_for(&fixture), "main", &marker_location())
        .expect("remote");
    assert_eq!(stale, VersionMarker(5));
}

#[test]
fn merge_fast_forwards_and_local_reread_sees_new_marker() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    let local = local_for(&fixture);
    assert_eq!(local.local_version().expect("before"), VersionMarker(5));

    let sync = sync_for(&fixture);
    sync.fetch_remote_metadata().expect("fetch");
    sync.merge_remote("main").expect("merge");

    assert_eq!(local.local_version().expect("after"), VersionMarker(6));
    let versions =
        resolve_versions(&local, &sync, "main", &marker_location()).expect("resolve");
    assert!(!versions.decision().is_update_required());
}

#[test]
fn diverged_history_fails_merge_without_moving_head() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    fixture.diverge_local("7").expect("diverge");
    let head = fixture.local_head().expect("head");

    let sync = sync_for(&fixture);
    sync.fetch_remote_metadata().expect("fetch");
    let err = sync.merge_remote("main").expect_err("diverged");

    assert!(matches!(
        err,
        SupervisorError::Sync {
            stage: SyncStage::Merge,
            ..
        }
    ));
    assert_eq!(fixture.local_head().expect("head"), head);
    assert_eq!(
        local_for(&fixture).local_version().expect("local"),
        VersionMarker(7)
    );
}

#[test]
fn require_clean_refuses_modified_tracked_files() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    fixture
        .write_local("neurons/miner.py", "print(\"patched\")\n")
        .expect("modify");
    let head = fixture.local_head().expect("head");

    let sync = sync_for(&fixture).require_clean(true);
    sync.fetch_remote_metadata().expect("fetch");
    let err = sync.merge_remote("main").expect_err("dirty");

    let SupervisorError::Sync { stage, message } = err else {
        panic!("expected sync error");
    };
    assert_eq!(stage, SyncStage::Merge);
    assert!(message.contains("neurons/miner.py"), "message: {message}");
    assert_eq!(fixture.local_head().expect("head"), head);
}

#[test]
fn untracked_files_do_not_block_require_clean() {
    let fixture = GitFixture::new("5").expect("fixture");
    fixture.publish_version("6").expect("publish");
    fixture
        .write_local("supervisor.toml", "[repo]\nrequire_clean = true\n")
        .expect("untracked");

    let sync = sync_for(&fixture).require_clean(true);
    sync.fetch_remote_metadata().expect("fetch");
    sync.merge_remote("main").expect("merge");
    assert_eq!(
        local_for(&fixture).local_version().expect("local"),
        VersionMarker(6)
    );
}

#[test]
fn unknown_remote_is_fetch_error() {
    let fixture = GitFixture::new("5").expect("fixture");
    let sync = GitRemoteSync::new(Git::new(&fixture.local), "upstream");
    let err = sync.fetch_remote_metadata().expect_err("no such remote");
    assert!(matches!(
        err,
        SupervisorError::Sync {
            stage: SyncStage::Fetch,
            ..
        }
    ));
}

#[test]
fn unknown_branch_is_read_error() {
    let fixture = GitFixture::new("5").expect("fixture");
    let sync = sync_for(&fixture);
    sync.fetch_remote_metadata().expect("fetch");
    let err = read_remote_version(&sync, "release", &marker_location()).expect_err("no branch");
    assert!(matches!(
        err,
        SupervisorError::Sync {
            stage: SyncStage::Read,
            ..
        }
    ));
}
