//! Governance gate for the guard's own policy files.
//!
//! Editing a guarded policy file requires a matching, unexpired approval in
//! `.sdp/policy-approvals.yml`. The gate runs after exception filtering and
//! cannot be overridden by an exception.

use crate::core::error::GuardError;
use crate::core::pattern;
use crate::core::project;
use crate::core::time;
use crate::plugins::verdict::{Finding, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const GOVERNANCE_RULE: &str = "governance-policy-edit";

/// Root-relative paths that need approval before they can change.
pub const GUARDED_POLICY_FILES: &[&str] = &[project::RULES_FILE, project::CONFIG_FILE];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyApprovalRecord {
    /// Exact path or glob.
    pub file: String,
    pub approved_at: String,
    pub approved_by: String,
    pub reason: String,
    pub expires_at: String,
    pub commit_hash: String,
    pub related_issues: Vec<String>,
}

impl PolicyApprovalRecord {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !time::is_expired_at(&self.expires_at, now)
    }

    pub fn covers(&self, rel_path: &str) -> bool {
        pattern::path_matches(&self.file, rel_path)
    }
}

#[derive(Debug, Deserialize)]
struct ApprovalsFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    approvals: Vec<PolicyApprovalRecord>,
}

fn default_version() -> u32 {
    1
}

pub fn is_guarded_policy_file(rel_path: &str) -> bool {
    GUARDED_POLICY_FILES.contains(&rel_path)
}

/// Absent file is an empty list. A file that exists but does not parse is
/// an error, so a broken approvals file blocks instead of granting.
pub fn load_approvals(path: &Path) -> Result<Vec<PolicyApprovalRecord>, GuardError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: ApprovalsFile = serde_yaml::from_str(&content)
        .map_err(|e| GuardError::ConfigError(format!("{}: {}", path.display(), e)))?;
    if file.version < 1 {
        return Err(GuardError::ConfigError(format!(
            "{}: approvals version must be >= 1, got {}",
            path.display(),
            file.version
        )));
    }
    Ok(file.approvals)
}

pub fn default_approvals_path(project_root: &Path) -> PathBuf {
    project_root.join(project::APPROVALS_FILE)
}

pub fn governance_meta_check(
    project_root: &Path,
    staged_files: &[PathBuf],
    approvals_path: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<Vec<Finding>, GuardError> {
    let guarded: Vec<String> = staged_files
        .iter()
        .map(|f| project::normalize_rel(project_root, f))
        .filter(|rel| is_guarded_policy_file(rel))
        .collect();
    if guarded.is_empty() {
        return Ok(Vec::new());
    }

    let approvals = match approvals_path {
        Some(path) => load_approvals(path)?,
        None => load_approvals(&default_approvals_path(project_root))?,
    };

    let findings = guarded
        .into_iter()
        .filter(|rel| {
            !approvals
                .iter()
                .any(|a| a.covers(rel) && a.is_live_at(now))
        })
        .map(|rel| {
            let message = format!(
                "{} is a guard policy file; record an approval in {} before editing it",
                rel,
                project::APPROVALS_FILE
            );
            Finding::new(Severity::Error, GOVERNANCE_RULE, &rel, message)
        })
        .collect();
    Ok(findings)
}
