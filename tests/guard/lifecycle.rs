use chrono::Duration;
use sdp_guard::core::store::{GuardState, StateStore};
use sdp_guard::core::time;
use sdp_guard::core::trace::{MemoryLog, TraceLog};
use sdp_guard::plugins::guard::Guard;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_state(root: &Path, state: &GuardState) {
    StateStore::for_project(root).save(state).unwrap();
}

#[test]
fn check_edit_denied_without_state() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);

    let decision = guard.check_edit(Path::new("src/lib.rs"));
    assert!(!decision.allowed);
    assert!(decision.reason.contains("no active workstream"));
    assert_eq!(decision.path, tmp.path().join("src/lib.rs").to_string_lossy());
}

#[test]
fn check_edit_unrestricted_scope_allows_any_path() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    guard.activate("00-012-03").unwrap();

    for path in ["src/lib.rs", "/etc/hosts", "../outside.txt", "docs/README.md"] {
        let decision = guard.check_edit(Path::new(path));
        assert!(decision.allowed, "expected {} to be allowed", path);
        assert_eq!(decision.active_ws, "00-012-03");
    }
}

#[test]
fn check_edit_restricted_scope_requires_exact_member() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    guard.activate("00-012-03").unwrap();
    guard
        .set_scope(&[PathBuf::from("src/a.rs"), PathBuf::from("src/b.rs")])
        .unwrap();

    assert!(guard.check_edit(Path::new("src/a.rs")).allowed);
    assert!(guard.check_edit(Path::new("./src/../src/b.rs")).allowed);
    assert!(guard.check_edit(&tmp.path().join("src/a.rs")).allowed);
    assert!(!guard.check_edit(Path::new("src/c.rs")).allowed);
    assert!(!guard.check_edit(Path::new("src")).allowed);
}

#[test]
fn relative_paths_resolve_against_cwd() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let sub = tmp.path().join("src");
    let guard = Guard::new(tmp.path(), &log).with_cwd(&sub);
    guard.activate("ws-1").unwrap();
    guard.set_scope(&[PathBuf::from("a.rs")]).unwrap();

    let at_root = Guard::new(tmp.path(), &log);
    assert!(at_root.check_edit(Path::new("src/a.rs")).allowed);
    assert!(!at_root.check_edit(Path::new("a.rs")).allowed);
}

#[test]
fn expiry_boundary_for_check_edit() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let now = time::now();

    guard
        .activate_at("ws-1", now - Duration::minutes(23 * 60 + 59))
        .unwrap();
    assert!(guard.check_edit_at(Path::new("a.rs"), now).allowed);

    guard.activate_at("ws-1", now - Duration::hours(25)).unwrap();
    let decision = guard.check_edit_at(Path::new("a.rs"), now);
    assert!(!decision.allowed);
    assert!(decision.reason.contains("expired"));
    assert_eq!(decision.active_ws, "");
}

#[test]
fn reactivation_restarts_the_clock_and_keeps_scope() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let now = time::now();

    guard.activate_at("ws-1", now - Duration::hours(30)).unwrap();
    guard.set_scope(&[PathBuf::from("a.rs")]).unwrap();
    assert_eq!(guard.active_ws_at(now), "");

    guard.activate_at("ws-2", now).unwrap();
    assert_eq!(guard.active_ws_at(now), "ws-2");
    assert_eq!(guard.status().scope_files.len(), 1);
}

#[test]
fn deactivate_clears_state_and_is_idempotent() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);

    guard.activate("ws-1").unwrap();
    assert_eq!(guard.active_ws(), "ws-1");
    guard.deactivate().unwrap();
    assert_eq!(guard.active_ws(), "");
    assert!(!guard.store().path().exists());
    guard.deactivate().unwrap();
    assert!(!guard.check_edit(Path::new("a.rs")).allowed);
}

#[test]
fn corrupt_state_fails_open_to_inactive() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let path = guard.store().path().to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "\u{0}\u{1}garbage").unwrap();

    assert_eq!(guard.active_ws(), "");
    assert!(!guard.check_edit(Path::new("a.rs")).allowed);
    guard.activate("ws-1").unwrap();
    assert_eq!(guard.active_ws(), "ws-1");
}

#[test]
fn state_written_by_hand_is_honoured() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    write_state(
        tmp.path(),
        &GuardState {
            active_ws: "00-012-03".to_string(),
            activated_at: time::now_rfc3339(),
            scope_files: vec!["/repo/a.x".to_string()],
            findings: vec![],
        },
    );
    let guard = Guard::new(tmp.path(), &log);
    assert!(guard.check_edit(Path::new("/repo/a.x")).allowed);
    assert!(!guard.check_edit(Path::new("/repo/b.x")).allowed);
}

#[test]
fn trace_log_records_lifecycle() {
    let tmp = tempdir().unwrap();
    let log = TraceLog::new(tmp.path().join(".sdp/log/guard-trace.jsonl"));
    let guard = Guard::new(tmp.path(), &log);

    guard.activate("ws-1").unwrap();
    guard.check_edit(Path::new("a.rs"));
    guard.deactivate().unwrap();

    let raw = std::fs::read_to_string(log.path()).unwrap();
    let ops: Vec<String> = raw
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["op"].to_string())
        .collect();
    assert_eq!(
        ops,
        vec![
            "\"guard.activate\"",
            "\"guard.check_edit\"",
            "\"guard.deactivate\""
        ]
    );
}

#[test]
fn separate_guards_do_not_share_logs() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let log_a = MemoryLog::new();
    let log_b = MemoryLog::new();

    Guard::new(a.path(), &log_a).activate("ws-a").unwrap();
    Guard::new(b.path(), &log_b).deactivate().unwrap();

    assert_eq!(log_a.ops(), vec!["guard.activate"]);
    assert_eq!(log_b.ops(), vec!["guard.deactivate"]);
}
