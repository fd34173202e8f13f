//! Integration test: join through the JSON-RPC daemon socket.
//!
//! Exercises the full client path:
//! 1. Start a daemon backed by an in-memory group directory
//! 2. Parse an invite URI and run the workflow through `RpcGroupService`
//! 3. Verify outcomes and the mapping of daemon errors and dropped calls

use std::time::Duration;

use tessera_integration_tests::{create_group, group_id, identity, TestDaemon};
use tessera_invite::GroupInviteLink;
use tessera_join::memory::GroupDirectory;
use tessera_join::rpc::{RpcGroupService, METHOD_GET_STATE};
use tessera_join::{run, JoinError, JoinStage};
use tessera_types::GroupMembershipState;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn join_over_socket_is_member() {
    let dir = tempfile::tempdir().expect("tempdir");
    let directory = GroupDirectory::new();
    let link = create_group(&directory, 1, "admin", false);
    let me = identity("newcomer");
    let daemon = TestDaemon::start(
        directory.session(me.clone()),
        &dir.path().join("daemon.sock"),
        None,
    );

    let client = RpcGroupService::new(daemon.socket_path(), TIMEOUT).expect("client");
    let parsed = tessera_invite::parse(&link.to_uri()).expect("parse");
    let outcome = run(&parsed, &me, &client).expect("join");

    assert_eq!(outcome.membership_state(), GroupMembershipState::Member);
    assert_eq!(outcome.notification_results().len(), 1);
}

#[test]
fn approval_over_socket_is_pending() {
    let dir = tempfile::tempdir().expect("tempdir");
    let directory = GroupDirectory::new();
    let link = create_group(&directory, 2, "admin", true);
    let me = identity("newcomer");
    let daemon = TestDaemon::start(
        directory.session(me.clone()),
        &dir.path().join("daemon.sock"),
        None,
    );

    let client = RpcGroupService::new(daemon.socket_path(), TIMEOUT).expect("client");
    let outcome = run(&link, &me, &client).expect("join");
    assert_eq!(
        outcome.membership_state(),
        GroupMembershipState::PendingApproval
    );
}

#[test]
fn daemon_errors_keep_their_meaning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let directory = GroupDirectory::new();
    let rejected_link = create_group(&directory, 3, "admin", true);
    let rotated_link = create_group(&directory, 4, "admin", false);
    let me = identity("newcomer");
    directory
        .reject(rejected_link.group_id(), &me)
        .expect("reject");
    directory.rotate_link(rotated_link.group_id()).expect("rotate");
    let daemon = TestDaemon::start(
        directory.session(me.clone()),
        &dir.path().join("daemon.sock"),
        None,
    );
    let client = RpcGroupService::new(daemon.socket_path(), TIMEOUT).expect("client");

    let err = run(&rejected_link, &me, &client).expect_err("rejected");
    assert!(matches!(err, JoinError::AlreadyRejected));

    let err = run(&rotated_link, &me, &client).expect_err("rotated");
    assert!(matches!(err, JoinError::LinkNotActive { .. }));

    let unknown = GroupInviteLink::generate(group_id(99));
    let err = run(&unknown, &me, &client).expect_err("unknown group");
    assert!(matches!(err, JoinError::LinkNotActive { .. }));
}

#[test]
fn dropped_read_back_is_transport_failure_after_join() {
    let dir = tempfile::tempdir().expect("tempdir");
    let directory = GroupDirectory::new();
    let link = create_group(&directory, 5, "admin", false);
    let me = identity("newcomer");
    let daemon = TestDaemon::start(
        directory.session(me.clone()),
        &dir.path().join("daemon.sock"),
        Some(METHOD_GET_STATE),
    );

    let client = RpcGroupService::new(daemon.socket_path(), TIMEOUT).expect("client");
    let err = run(&link, &me, &client).expect_err("read-back dropped");
    assert!(matches!(
        err,
        JoinError::TransportFailure {
            stage: JoinStage::FetchState,
            ..
        }
    ));

    // The join itself went through.
    let state = tessera_join::GroupService::fetch_group_state(
        &directory.session(identity("admin")),
        link.group_id(),
    )
    .expect("state");
    assert!(state.is_member(&me));
}

#[test]
fn missing_daemon_is_transport_failure_before_join() {
    let dir = tempfile::tempdir().expect("tempdir");
    let directory = GroupDirectory::new();
    let link = create_group(&directory, 6, "admin", false);
    let me = identity("newcomer");

    let client =
        RpcGroupService::new(dir.path().join("absent.sock"), TIMEOUT).expect("client");
    let err = run(&link, &me, &client).expect_err("no daemon");
    assert!(matches!(
        err,
        JoinError::TransportFailure {
            stage: JoinStage::Join,
            ..
        }
    ));
    assert!(err.is_retryable());
}
