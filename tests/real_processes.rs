// tests/real_processes.rs
#![cfg(unix)]

use std::time::Duration;

use nix::sys::signal::kill;
use nix::unistd::{getpgid, Pid};
use tempfile::TempDir;
use tokio::sync::mpsc;

use relaunch::engine::{SupervisorEvent, SupervisorNotice, TriggerReason};
use relaunch::errors::SupervisorError;
use relaunch::exec::{ProcessLauncher, RealProcessLauncher, Termination};
use relaunch::supervisor::{Supervisor, SupervisorHandle};
use relaunch::types::SupervisorMode;
use relaunch_test_utils::builders::SupervisorConfigBuilder;
use relaunch_test_utils::{init_tracing, with_timeout};

fn start(
    builder: SupervisorConfigBuilder,
    root: &TempDir,
    mode: SupervisorMode,
) -> (SupervisorHandle, mpsc::UnboundedReceiver<SupervisorNotice>) {
    let mut supervisor = Supervisor::new(builder.root(root.path()).build())
        .mode(mode)
        .watch_files(false);
    let notices = supervisor.notices();
    (supervisor.start().expect("supervisor should start"), notices)
}

async fn next_notice(
    rx: &mut mpsc::UnboundedReceiver<SupervisorNotice>,
    pred: impl Fn(&SupervisorNotice) -> bool,
) -> SupervisorNotice {
    loop {
        let notice = rx.recv().await.expect("notice stream ended");
        if pred(&notice) {
            return notice;
        }
    }
}

async fn spawned_pid(rx: &mut mpsc::UnboundedReceiver<SupervisorNotice>) -> u32 {
    match with_timeout(next_notice(rx, |n| {
        matches!(n, SupervisorNotice::ChildSpawned { .. })
    }))
    .await
    {
        SupervisorNotice::ChildSpawned { pid, .. } => pid,
        other => panic!("expected ChildSpawned, got {other:?}"),
    }
}

fn is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// A launcher whose mailbox (capacity 1) is already full.
fn launcher_with_full_mailbox(
    root: &TempDir,
) -> (RealProcessLauncher, mpsc::Receiver<SupervisorEvent>) {
    let (tx, rx) = mpsc::channel(1);
    tx.try_send(SupervisorEvent::RebuildRequested {
        reason: TriggerReason::Manual,
    })
    .unwrap();
    (RealProcessLauncher::new(tx, root.path()), rx)
}

#[tokio::test]
async fn successful_build_spawns_and_stop_terminates() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut handle, mut notices) = start(
        SupervisorConfigBuilder::new()
            .build_cmd("echo built")
            .run_cmd("sleep 30"),
        &root,
        SupervisorMode::Watch,
    );

    let notice = with_timeout(next_notice(&mut notices, |n| {
        matches!(n, SupervisorNotice::BuildSucceeded { .. })
    }))
    .await;
    match notice {
        SupervisorNotice::BuildSucceeded { output, .. } => {
            assert_eq!(output.stdout.trim(), "built");
        }
        other => panic!("expected BuildSucceeded, got {other:?}"),
    }

    let pid = spawned_pid(&mut notices).await;
    assert!(is_alive(pid));

    with_timeout(handle.stop()).await.unwrap();
    assert!(!is_alive(pid), "child {pid} survived stop()");
}

#[tokio::test]
async fn rebuild_replaces_the_child_with_a_new_pid() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut handle, mut notices) = start(
        SupervisorConfigBuilder::new().run_cmd("sleep 30"),
        &root,
        SupervisorMode::Watch,
    );

    let first = spawned_pid(&mut notices).await;
    handle.notify_changed(root.path().join("a.src")).await.unwrap();
    let second = spawned_pid(&mut notices).await;

    assert_ne!(first, second);
    assert!(!is_alive(first), "old child {first} still running");
    assert!(is_alive(second));

    with_timeout(handle.stop()).await.unwrap();
    assert!(!is_alive(second));
}

#[tokio::test]
async fn failing_build_carries_stderr_and_spawns_nothing() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut handle, mut notices) = start(
        SupervisorConfigBuilder::new().build_cmd("echo 'error: X' >&2; exit 1"),
        &root,
        SupervisorMode::CompileOnce,
    );

    let summary = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(summary.exit_code(), 1);

    let mut saw_failure = false;
    while let Ok(notice) = notices.try_recv() {
        match notice {
            SupervisorNotice::BuildFailed { error, .. } => {
                let SupervisorError::BuildFailure { code, ref stderr, .. } = error else {
                    panic!("expected BuildFailure, got {error:?}");
                };
                assert_eq!(code, Some(1));
                assert!(stderr.contains("error: X"));
                assert!(error.to_string().contains("error: X"));
                saw_failure = true;
            }
            SupervisorNotice::ChildSpawned { .. } => panic!("nothing should be spawned"),
            _ => {}
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn compile_once_exits_when_the_program_exits() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut handle, mut notices) = start(
        SupervisorConfigBuilder::new().run_cmd("exit 4"),
        &root,
        SupervisorMode::CompileOnce,
    );

    let summary = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(summary.exit_code(), 0);

    let notice = with_timeout(next_notice(&mut notices, |n| {
        matches!(n, SupervisorNotice::ChildExited { .. })
    }))
    .await;
    assert!(matches!(
        notice,
        SupervisorNotice::ChildExited { code: Some(4), .. }
    ));
}

#[tokio::test]
async fn child_ignoring_sigterm_is_killed_after_the_grace_period() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut handle, mut notices) = start(
        SupervisorConfigBuilder::new()
            .run_cmd("trap '' TERM; while true; do sleep 0.05; done")
            .grace_period("200ms"),
        &root,
        SupervisorMode::Watch,
    );

    let pid = spawned_pid(&mut notices).await;
    // Let the shell install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.request_rebuild().await.unwrap();

    let notice = with_timeout(next_notice(&mut notices, |n| {
        matches!(n, SupervisorNotice::TerminationTimeout { .. })
    }))
    .await;
    match notice {
        SupervisorNotice::TerminationTimeout {
            error: SupervisorError::TerminationTimeout { pid: timed_out, grace },
        } => {
            assert_eq!(timed_out, pid);
            assert_eq!(grace, Duration::from_millis(200));
        }
        other => panic!("expected TerminationTimeout, got {other:?}"),
    }
    assert!(!is_alive(pid));

    with_timeout(handle.stop()).await.unwrap();
}

#[tokio::test]
async fn stop_kills_an_in_flight_build() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut handle, mut notices) = start(
        SupervisorConfigBuilder::new().build_cmd("sleep 30"),
        &root,
        SupervisorMode::Watch,
    );

    with_timeout(next_notice(&mut notices, |n| {
        matches!(n, SupervisorNotice::BuildStarted { .. })
    }))
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Would take 30s if the build were awaited instead of killed.
    let summary = with_timeout(handle.stop()).await.unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.last_cycle_ok, None);
}

#[tokio::test]
async fn unknown_working_directory_is_a_failed_build() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let missing = root.path().join("missing");
    let mut supervisor = Supervisor::new(
        SupervisorConfigBuilder::new().root(&missing).build(),
    )
    .mode(SupervisorMode::CompileOnce)
    .watch_files(false);
    let mut notices = supervisor.notices();
    let mut handle = supervisor.start().unwrap();

    let summary = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(summary.exit_code(), 1);

    let notice = with_timeout(next_notice(&mut notices, |n| {
        matches!(n, SupervisorNotice::BuildFailed { .. })
    }))
    .await;
    assert!(matches!(
        notice,
        SupervisorNotice::BuildFailed {
            error: SupervisorError::BuildFailure { code: None, .. },
            ..
        }
    ));
}

#[tokio::test]
async fn terminating_an_exited_child_does_not_block_on_a_full_mailbox() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut launcher, mut rx) = launcher_with_full_mailbox(&root);

    launcher.spawn_child("exit 0").await.unwrap();
    // Let the child exit; its report is now stuck behind the full mailbox.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let termination = with_timeout(launcher.terminate_child(Duration::from_millis(100)))
        .await
        .unwrap();
    assert_eq!(termination, None);

    assert!(matches!(
        rx.try_recv(),
        Ok(SupervisorEvent::RebuildRequested { .. })
    ));
    assert!(rx.try_recv().is_err(), "exit report should have been dropped");
}

#[tokio::test]
async fn cancelling_a_finished_build_does_not_block_on_a_full_mailbox() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (mut launcher, mut rx) = launcher_with_full_mailbox(&root);

    launcher.start_build(1, "true").await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    with_timeout(launcher.cancel_build()).await.unwrap();

    assert!(matches!(
        rx.try_recv(),
        Ok(SupervisorEvent::RebuildRequested { .. })
    ));
    assert!(rx.try_recv().is_err(), "build result should have been dropped");
}

#[tokio::test]
async fn child_stays_in_the_supervisor_process_group() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (tx, _rx) = mpsc::channel(4);
    let mut launcher = RealProcessLauncher::new(tx, root.path());

    let pid = launcher.spawn_child("sleep 30").await.unwrap();
    let child_group = getpgid(Some(Pid::from_raw(pid as i32))).unwrap();
    assert_eq!(child_group, getpgid(None).unwrap());

    let termination = with_timeout(launcher.terminate_child(Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(
        termination,
        Some(Termination {
            pid,
            timed_out: false
        })
    );
    assert!(!is_alive(pid));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn simple_run_command_replaces_the_shell() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let (tx, _rx) = mpsc::channel(4);
    let mut launcher = RealProcessLauncher::new(tx, root.path());

    let pid = launcher.spawn_child("sleep 30").await.unwrap();
    let comm = format!("/proc/{pid}/comm");
    // `sh` becomes `sleep` once it has exec'd.
    with_timeout(async {
        while std::fs::read_to_string(&comm).unwrap_or_default().trim() != "sleep" {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    with_timeout(launcher.terminate_child(Duration::from_secs(2)))
        .await
        .unwrap();
}
