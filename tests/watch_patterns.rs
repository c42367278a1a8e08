// tests/watch_patterns.rs

use std::path::Path;
use std::time::Duration;

use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::EventKind;

use relaunch::types::{parse_duration, ChangeKind};
use relaunch::watch::path_utils::{normalize_pattern, relative_str};
use relaunch::watch::{classify_event_kind, WatchSet};

fn set(watch: &[&str], exclude: &[&str]) -> WatchSet {
    let watch: Vec<String> = watch.iter().map(|s| s.to_string()).collect();
    let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
    WatchSet::new(&watch, &exclude).unwrap()
}

#[test]
fn single_star_does_not_cross_directories() {
    let ws = set(&["source/*.cpp"], &[]);

    assert!(ws.matches("source/main.cpp"));
    assert!(!ws.matches("source/nested/main.cpp"));
    assert!(!ws.matches("source/main.h"));
}

#[test]
fn double_star_recurses() {
    let ws = set(&["**/*.src"], &[]);

    assert!(ws.matches("a.src"));
    assert!(ws.matches("deep/er/b.src"));
    assert!(!ws.matches("b.txt"));
}

#[test]
fn excludes_win_over_watches() {
    let ws = set(&["src/**/*.rs"], &["src/generated/**"]);

    assert!(ws.matches("src/lib.rs"));
    assert!(!ws.matches("src/generated/out.rs"));
}

#[test]
fn leading_dot_slash_is_ignored() {
    let ws = set(&["./source/*.cpp"], &[]);

    assert_eq!(ws.patterns(), ["source/*.cpp"]);
    assert!(ws.matches("source/a.cpp"));
    assert_eq!(normalize_pattern("././x/*.c"), "x/*.c");
}

#[test]
fn blank_patterns_leave_an_empty_set() {
    let ws = set(&["", "  "], &[]);
    assert!(ws.is_empty());
    assert!(!ws.matches("anything"));
}

#[test]
fn invalid_glob_names_the_pattern() {
    let err = WatchSet::new(&["a/[b".to_string()], &[]).unwrap_err();
    assert!(format!("{err:#}").contains("a/[b"));
}

#[test]
fn relative_paths_use_forward_slashes() {
    let root = Path::new("/project");
    assert_eq!(
        relative_str(root, Path::new("/project/source/a.cpp")).as_deref(),
        Some("source/a.cpp")
    );
    assert_eq!(relative_str(root, Path::new("/elsewhere/a.cpp")), None);
}

#[test]
fn access_events_are_not_changes() {
    assert_eq!(classify_event_kind(&EventKind::Access(AccessKind::Any)), None);
    assert_eq!(
        classify_event_kind(&EventKind::Create(CreateKind::File)),
        Some(ChangeKind::Created)
    );
    assert_eq!(
        classify_event_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
        Some(ChangeKind::Renamed)
    );
    assert_eq!(
        classify_event_kind(&EventKind::Modify(ModifyKind::Any)),
        Some(ChangeKind::Modified)
    );
    assert_eq!(
        classify_event_kind(&EventKind::Remove(RemoveKind::File)),
        Some(ChangeKind::Removed)
    );
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
    assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("5").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration("").is_err());
}

#[test]
fn oversized_durations_are_errors_not_overflows() {
    // u64::MAX / 60 rounded up
    let err = parse_duration("307445734561825861m").unwrap_err();
    assert!(err.contains("too large"), "message was: {err}");
    assert!(parse_duration("5124095576030432h").is_err());

    assert_eq!(
        parse_duration("307445734561825860m"),
        Ok(Duration::from_secs(307445734561825860 * 60))
    );
}
