// tests/file_watcher.rs

use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use relaunch::engine::SupervisorEvent;
use relaunch::supervisor::Supervisor;
use relaunch::watch::{spawn_watcher, WatchSet};
use relaunch_test_utils::builders::SupervisorConfigBuilder;
use relaunch_test_utils::fake_launcher::FakeControl;
use relaunch_test_utils::{init_tracing, with_timeout};

/// Give the OS watcher time to register (and deliver pending events).
async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn only_matching_files_reach_the_mailbox() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let watch_set = WatchSet::new(&["*.src".to_string()], &[]).unwrap();
    let (tx, mut rx) = mpsc::channel(16);

    let mut watcher = spawn_watcher(root.path(), watch_set, tx).unwrap();
    assert!(watcher.is_active());
    settle().await;

    fs::write(root.path().join("b.txt"), "ignored").unwrap();
    fs::write(root.path().join("a.src"), "watched").unwrap();

    let event = with_timeout(rx.recv()).await.expect("watcher closed");
    match event {
        SupervisorEvent::FileChanged { path, .. } => {
            assert_eq!(path.file_name().unwrap(), "a.src");
        }
        other => panic!("expected FileChanged, got {other:?}"),
    }

    watcher.stop().await;
    assert!(!watcher.is_active());
}

#[tokio::test]
async fn touching_a_watched_file_rebuilds() {
    init_tracing();
    let root = TempDir::new().unwrap();
    let config = SupervisorConfigBuilder::new()
        .watch("*.src")
        .root(root.path())
        .build();
    let control = FakeControl::new().auto_complete([]);

    let mut handle = Supervisor::new(config)
        .start_with(|tx| control.launcher(tx))
        .unwrap();
    assert!(handle.is_watching());

    with_timeout(control.wait_for_spawns(1)).await;
    settle().await;

    fs::write(root.path().join("notes.txt"), "ignored").unwrap();
    settle().await;
    assert_eq!(control.builds(), vec![1]);

    fs::write(root.path().join("a.src"), "changed").unwrap();
    // One write may surface as several events; at least one more cycle runs.
    with_timeout(control.wait_for_spawns(2)).await;
    assert!(!control.saw_overlapping_children());

    with_timeout(handle.stop()).await.unwrap();
    assert!(!handle.is_watching());
    assert_eq!(control.running_child(), None);
}
