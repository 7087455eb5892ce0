//! Guard orchestrator.
//!
//! Owns the workstream lifecycle (Inactive -> Active via `activate`, back via
//! `deactivate` or 24h expiry observed on the next read) and composes the
//! diff source, rule engine, exception manager and governance gate into one
//! staged/CI verdict.

use crate::core::error::GuardError;
use crate::core::project;
use crate::core::store::{GuardState, StateStore};
use crate::core::time;
use crate::core::trace::{GuardLog, TraceEvent};
use crate::plugins::diff::DiffSource;
use crate::plugins::exceptions;
use crate::plugins::governance;
use crate::plugins::review;
use crate::plugins::rules::RuleSet;
use crate::plugins::verdict::{
    CheckResult, Finding, Severity, build_check_result, build_check_result_with_exceptions,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

pub const SCOPE_RULE: &str = "scope-check";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditDecision {
    pub allowed: bool,
    pub path: String,
    pub active_ws: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardStatus {
    pub active_ws: String,
    pub activated_at: String,
    pub expired: bool,
    pub scope_files: Vec<String>,
    pub review_findings: usize,
    pub blocking_findings: usize,
}

pub struct Guard<'a> {
    root: PathBuf,
    cwd: PathBuf,
    store: StateStore,
    approvals_path: Option<PathBuf>,
    log: &'a dyn GuardLog,
}

impl<'a> Guard<'a> {
    pub fn new(project_root: &Path, log: &'a dyn GuardLog) -> Self {
        Self {
            root: project_root.to_path_buf(),
            cwd: project_root.to_path_buf(),
            store: StateStore::for_project(project_root),
            approvals_path: None,
            log,
        }
    }

    /// Base directory for resolving relative paths (the caller's cwd).
    pub fn with_cwd(mut self, cwd: &Path) -> Self {
        self.cwd = cwd.to_path_buf();
        self
    }

    pub fn with_approvals_path(mut self, path: &Path) -> Self {
        self.approvals_path = Some(path.to_path_buf());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // Trace errors are dropped.
    fn trace(&self, op: &str, request: serde_json::Value, response: serde_json::Value) {
        let _ = self.log.record(TraceEvent::new(op, request, response));
    }

    fn resolve(&self, path: &Path) -> String {
        project::resolve_path(&self.cwd, path)
            .to_string_lossy()
            .to_string()
    }

    pub fn activate(&self, ws_id: &str) -> Result<GuardState, GuardError> {
        self.activate_at(ws_id, time::now())
    }

    pub fn activate_at(&self, ws_id: &str, now: DateTime<Utc>) -> Result<GuardState, GuardError> {
        let ws_id = ws_id.trim();
        if ws_id.is_empty() {
            return Err(GuardError::ValidationError(
                "workstream id must not be empty".to_string(),
            ));
        }
        let mut state = self.store.load();
        state.active_ws = ws_id.to_string();
        state.activated_at = time::rfc3339(now);
        self.store.save(&state)?;
        self.trace(
            "guard.activate",
            json!({ "ws_id": ws_id }),
            json!({ "activated_at": state.activated_at, "scope_files": state.scope_files.len() }),
        );
        Ok(state)
    }

    pub fn deactivate(&self) -> Result<(), GuardError> {
        let previous = self.store.load().active_ws;
        self.store.clear()?;
        self.trace("guard.deactivate", json!({ "ws_id": previous }), json!({}));
        Ok(())
    }

    /// Active workstream id, or empty when inactive or expired.
    pub fn active_ws(&self) -> String {
        self.active_ws_at(time::now())
    }

    pub fn active_ws_at(&self, now: DateTime<Utc>) -> String {
        let state = self.store.load();
        if state.is_expired_at(now) {
            String::new()
        } else {
            state.active_ws
        }
    }

    pub fn check_edit(&self, path: &Path) -> EditDecision {
        self.check_edit_at(path, time::now())
    }

    pub fn check_edit_at(&self, path: &Path, now: DateTime<Utc>) -> EditDecision {
        let resolved = self.resolve(path);
        let state = self.store.load();

        let (allowed, reason) = if state.active_ws.is_empty() {
            (false, "no active workstream; run `sdp-guard activate <ws-id>` first".to_string())
        } else if state.is_expired_at(now) {
            (
                false,
                format!(
                    "workstream {} activation expired; re-activate to continue",
                    state.active_ws
                ),
            )
        } else if state.scope_files.is_empty() {
            (true, "no scope restriction".to_string())
        } else if state.scope_files.iter().any(|f| f == &resolved) {
            (true, format!("in scope of {}", state.active_ws))
        } else {
            (false, format!("outside the declared scope of {}", state.active_ws))
        };

        let decision = EditDecision {
            allowed,
            path: resolved,
            active_ws: if state.is_expired_at(now) {
                String::new()
            } else {
                state.active_ws
            },
            reason,
        };
        self.trace(
            "guard.check_edit",
            json!({ "path": decision.path }),
            json!({ "allowed": decision.allowed, "reason": decision.reason }),
        );
        decision
    }

    /// Replaces the scope list. Leaves the activation untouched.
    pub fn set_scope(&self, files: &[PathBuf]) -> Result<Vec<String>, GuardError> {
        let mut state = self.store.load();
        let mut scope: Vec<String> = Vec::with_capacity(files.len());
        for file in files {
            let resolved = self.resolve(file);
            if !scope.contains(&resolved) {
                scope.push(resolved);
            }
        }
        state.scope_files = scope.clone();
        self.store.save(&state)?;
        self.trace("guard.set_scope", json!({ "files": scope }), json!({}));
        Ok(scope)
    }

    pub fn clear_scope(&self) -> Result<(), GuardError> {
        self.set_scope(&[]).map(|_| ())
    }

    pub fn status(&self) -> GuardStatus {
        let state = self.store.load();
        GuardStatus {
            expired: state.is_expired(),
            review_findings: review::finding_count(&state),
            blocking_findings: review::blocking_findings(&state).len(),
            active_ws: state.active_ws,
            activated_at: state.activated_at,
            scope_files: state.scope_files,
        }
    }

    pub fn staged_check(
        &self,
        source: &dyn DiffSource,
        rules: &RuleSet,
    ) -> Result<CheckResult, GuardError> {
        self.staged_check_at(source, rules, time::now())
    }

    pub fn staged_check_at(
        &self,
        source: &dyn DiffSource,
        rules: &RuleSet,
        now: DateTime<Utc>,
    ) -> Result<CheckResult, GuardError> {
        let files: Vec<PathBuf> = source
            .changed_files()
            .iter()
            .map(|f| project::resolve_path(&self.root, f))
            .collect();
        if files.is_empty() {
            self.trace("guard.staged_check", json!({ "files": 0 }), json!({ "exit_code": 0 }));
            return Ok(CheckResult::pass());
        }

        let state = self.store.load();
        let mut findings = self.scope_findings(&state, &files, now);

        for file in &files {
            if !file.is_file() {
                continue;
            }
            let bytes = std::fs::read(file)?;
            if is_binary(&bytes) {
                continue;
            }
            let content = String::from_utf8_lossy(&bytes);
            findings.extend(rules.evaluate(&file.to_string_lossy(), &content));
        }

        let applied =
            exceptions::applied_exceptions(&findings, &rules.exceptions, Some(&self.root), now);
        let mut kept =
            exceptions::apply_exceptions(findings, &rules.exceptions, Some(&self.root), now);

        kept.extend(governance::governance_meta_check(
            &self.root,
            &files,
            self.approvals_path.as_deref(),
            now,
        )?);

        let result = if applied.is_empty() {
            build_check_result(kept)
        } else {
            build_check_result_with_exceptions(kept, applied)
        };

        self.trace(
            "guard.staged_check",
            json!({ "files": files.len(), "active_ws": state.active_ws }),
            json!({
                "exit_code": result.exit_code.code(),
                "errors": result.summary.errors,
                "warnings": result.summary.warnings,
                "applied_exceptions": result.summary.applied_exceptions,
            }),
        );
        Ok(result)
    }

    /// Scope drift is advisory: always WARNING.
    fn scope_findings(&self, state: &GuardState, files: &[PathBuf], now: DateTime<Utc>) -> Vec<Finding> {
        if state.is_expired_at(now) || state.scope_files.is_empty() {
            return Vec::new();
        }
        files
            .iter()
            .map(|f| f.to_string_lossy().to_string())
            .filter(|f| !state.scope_files.contains(f))
            .map(|f| {
                let message = format!("{} is outside the scope of workstream {}", f, state.active_ws);
                Finding::new(Severity::Warning, SCOPE_RULE, &f, message)
            })
            .collect()
    }
}

/// NUL in the content marks a binary file. Other encodings are decoded
/// lossily and still checked.
fn is_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}
