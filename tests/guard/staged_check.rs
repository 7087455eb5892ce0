use chrono::Duration;
use sdp_guard::core::time;
use sdp_guard::core::trace::MemoryLog;
use sdp_guard::plugins::diff::{DiffSource, StaticDiffSource};
use sdp_guard::plugins::exceptions::Exception;
use sdp_guard::plugins::guard::{Guard, SCOPE_RULE};
use sdp_guard::plugins::rules::{RuleRegistry, RuleSet};
use sdp_guard::plugins::verdict::{ExitCode, Severity};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

struct FailingGit;

impl DiffSource for FailingGit {
    fn changed_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn lines(n: usize) -> String {
    (0..n).map(|i| format!("let v{} = {};\n", i, i)).collect()
}

fn rules(yaml: &str) -> RuleSet {
    RuleSet::parse(yaml, &RuleRegistry::builtin()).unwrap()
}

#[test]
fn scenario_scope_drift_is_a_warning_only() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);

    guard.activate("00-012-03").unwrap();
    guard.set_scope(&[PathBuf::from("/repo/a.x")]).unwrap();

    let source = StaticDiffSource::new(vec![PathBuf::from("/repo/a.x"), PathBuf::from("/repo/b.x")]);
    let result = guard.staged_check(&source, &RuleSet::defaults()).unwrap();

    assert!(result.success);
    assert_eq!(result.exit_code, ExitCode::Pass);
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Warning);
    assert_eq!(finding.rule, SCOPE_RULE);
    assert_eq!(finding.file, "/repo/b.x");
}

#[test]
fn empty_file_set_is_an_immediate_pass() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let result = guard.staged_check(&FailingGit, &RuleSet::defaults()).unwrap();
    assert!(result.success);
    assert_eq!(result.summary.total, 0);
    assert_eq!(log.ops(), vec!["guard.staged_check"]);
}

#[test]
fn no_scope_findings_when_inactive() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    guard.set_scope(&[PathBuf::from("/repo/a.x")]).unwrap();

    let source = StaticDiffSource::new(vec![PathBuf::from("/repo/b.x")]);
    let result = guard.staged_check(&source, &RuleSet::defaults()).unwrap();
    assert!(result.findings.is_empty());
}

#[test]
fn rule_errors_block_and_warnings_do_not() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);

    let big = write(tmp.path(), "src/big.rs", &lines(12));
    let todo = write(tmp.path(), "src/todo.rs", "// TODO: later\nfn f() {}\n");
    let set = rules(
        "version: 1\nrules:\n  - id: max-file-loc\n    severity: error\n    config:\n      max_lines: 10\n  - id: no-orphaned-todos\n    severity: warning\n",
    );

    let warn_only = guard
        .staged_check(&StaticDiffSource::new(vec![todo.clone()]), &set)
        .unwrap();
    assert!(warn_only.success);
    assert_eq!(warn_only.summary.warnings, 1);

    let both = guard
        .staged_check(&StaticDiffSource::new(vec![big, todo]), &set)
        .unwrap();
    assert!(!both.success);
    assert_eq!(both.exit_code, ExitCode::Violation);
    assert_eq!(both.summary.errors, 1);
    assert_eq!(both.summary.warnings, 1);
    let error = both.errors().next().unwrap();
    assert_eq!(error.rule, "max-file-loc");
    assert!(error.file.ends_with("src/big.rs"));
}

#[test]
fn missing_and_binary_files_are_skipped_by_rules() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let bin = tmp.path().join("logo.png");
    fs::write(&bin, [0xff_u8, 0xfe, 0x00, 0x54, 0x4f, 0x44, 0x4f]).unwrap();

    let set = rules("version: 1\nrules:\n  - id: max-file-loc\n    severity: error\n    config:\n      max_lines: 1\n");
    let source = StaticDiffSource::new(vec![bin, tmp.path().join("deleted.rs")]);
    let result = guard.staged_check(&source, &set).unwrap();
    assert!(result.success);
    assert!(result.findings.is_empty());
}

#[test]
fn non_utf8_text_is_still_checked() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let path = tmp.path().join("src/menu.rs");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut bytes = Vec::new();
    for _ in 0..300 {
        bytes.extend_from_slice(b"// caf\xe9\n");
    }
    fs::write(&path, bytes).unwrap();

    let set = rules("version: 1\nrules:\n  - id: max-file-loc\n    severity: error\n    config:\n      max_lines: 200\n");
    let result = guard
        .staged_check(&StaticDiffSource::new(vec![path]), &set)
        .unwrap();
    assert_eq!(result.exit_code, ExitCode::Violation);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].rule, "max-file-loc");
}

#[test]
fn exception_star_stays_in_one_directory() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let top = write(tmp.path(), "src/top.rs", &lines(5));
    let deep = write(tmp.path(), "src/deep/inner.rs", &lines(5));

    let mut set = rules("version: 1\nrules:\n  - id: max-file-loc\n    severity: error\n    config:\n      max_lines: 2\n");
    for pattern in ["src/*.rs", "*.rs"] {
        set.exceptions.push(Exception {
            rule_id: String::new(),
            file: pattern.to_string(),
            reason: "top-level only".to_string(),
            owner: "platform".to_string(),
            expires_at: String::new(),
        });
    }

    let result = guard
        .staged_check(&StaticDiffSource::new(vec![top, deep]), &set)
        .unwrap();
    assert_eq!(result.exit_code, ExitCode::Violation);
    assert_eq!(result.findings.len(), 1);
    assert!(result.findings[0].file.ends_with("src/deep/inner.rs"));
    assert_eq!(result.summary.applied_exceptions, Some(1));
}

#[test]
fn live_exception_suppresses_and_is_audited() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let big = write(tmp.path(), "legacy/parser.rs", &lines(5));

    let yaml = format!(
        "version: 1\nrules:\n  - id: max-file-loc\n    severity: error\n    config:\n      max_lines: 2\nexceptions:\n  - rule_id: max-file-loc\n    file: \"legacy/*.rs\"\n    reason: split planned\n    owner: platform\n    expires_at: \"{}\"\n",
        time::rfc3339(time::now() + Duration::days(7))
    );
    let result = guard
        .staged_check(&StaticDiffSource::new(vec![big]), &rules(&yaml))
        .unwrap();

    assert!(result.success);
    assert!(result.findings.is_empty());
    assert_eq!(result.summary.applied_exceptions, Some(1));
    let applied = result.applied_exceptions.as_ref().unwrap();
    assert_eq!(applied[0].owner, "platform");
    assert_eq!(applied[0].reason, "split planned");
    assert_eq!(applied[0].rule, "max-file-loc");
}

#[test]
fn expired_exception_leaves_the_violation() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let big = write(tmp.path(), "legacy/parser.rs", &lines(5));

    let mut set = rules("version: 1\nrules:\n  - id: max-file-loc\n    severity: error\n    config:\n      max_lines: 2\n");
    set.exceptions.push(Exception {
        rule_id: String::new(),
        file: "legacy/parser.rs".to_string(),
        reason: "old".to_string(),
        owner: "platform".to_string(),
        expires_at: "2020-01-01".to_string(),
    });

    let result = guard
        .staged_check(&StaticDiffSource::new(vec![big]), &set)
        .unwrap();
    assert_eq!(result.exit_code, ExitCode::Violation);
    assert_eq!(result.summary.applied_exceptions, None);
}

#[test]
fn scope_warnings_can_be_excepted() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    guard.activate("ws-1").unwrap();
    guard.set_scope(&[PathBuf::from("src/a.rs")]).unwrap();

    let mut set = RuleSet::defaults();
    set.exceptions.push(Exception {
        rule_id: SCOPE_RULE.to_string(),
        file: "docs/**".to_string(),
        reason: "docs follow the code".to_string(),
        owner: "docs".to_string(),
        expires_at: String::new(),
    });

    let source = StaticDiffSource::new(vec![
        tmp.path().join("docs/guide/intro.md"),
        tmp.path().join("src/b.rs"),
    ]);
    let result = guard.staged_check(&source, &set).unwrap();
    assert_eq!(result.findings.len(), 1);
    assert!(result.findings[0].file.ends_with("src/b.rs"));
    assert_eq!(result.summary.applied_exceptions, Some(1));
}

#[test]
fn wildcard_exception_cannot_silence_governance() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let rules_file = write(tmp.path(), ".sdp/guard-rules.yml", "version: 1\nrules: []\n");

    let mut set = RuleSet::defaults();
    set.exceptions.push(Exception {
        rule_id: String::new(),
        file: "**".to_string(),
        reason: "everything".to_string(),
        owner: "nobody".to_string(),
        expires_at: String::new(),
    });

    let result = guard
        .staged_check(&StaticDiffSource::new(vec![rules_file]), &set)
        .unwrap();
    assert_eq!(result.exit_code, ExitCode::Violation);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].rule, "governance-policy-edit");
}

#[test]
fn verdict_is_traced() {
    let tmp = tempdir().unwrap();
    let log = MemoryLog::new();
    let guard = Guard::new(tmp.path(), &log);
    let file = write(tmp.path(), "a.rs", "fn a() {}\n");
    guard
        .staged_check(&StaticDiffSource::new(vec![file]), &RuleSet::defaults())
        .unwrap();
    let events = log.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].op, "guard.staged_check");
    assert_eq!(events[0].response["exit_code"], 0);
}
