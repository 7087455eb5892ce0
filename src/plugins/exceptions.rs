//! Exception manager: time-bounded overrides that suppress findings.
//!
//! Each finding is matched independently against the full exception list on
//! every call. Expired exceptions never match.

use crate::core::pattern;
use crate::core::project;
use crate::core::time;
use crate::plugins::verdict::{AppliedException, Finding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    /// Empty matches any rule.
    #[serde(default)]
    pub rule_id: String,
    /// Exact path or glob.
    pub file: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub expires_at: String,
}

impl Exception {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        time::is_expired_at(&self.expires_at, now)
    }

    pub fn matches(&self, finding: &Finding, root: Option<&Path>, now: DateTime<Utc>) -> bool {
        if self.is_expired_at(now) {
            return false;
        }
        if !self.rule_id.is_empty() && self.rule_id != finding.rule {
            return false;
        }
        if pattern::path_matches(&self.file, &finding.file) {
            return true;
        }
        match root {
            Some(root) => {
                let rel = project::normalize_rel(root, Path::new(&finding.file));
                pattern::path_matches(&self.file, &rel)
            }
            None => false,
        }
    }
}

fn first_match<'a>(
    finding: &Finding,
    exceptions: &'a [Exception],
    root: Option<&Path>,
    now: DateTime<Utc>,
) -> Option<&'a Exception> {
    exceptions.iter().find(|e| e.matches(finding, root, now))
}

/// Findings that no live exception covers.
pub fn apply_exceptions(
    findings: Vec<Finding>,
    exceptions: &[Exception],
    root: Option<&Path>,
    now: DateTime<Utc>,
) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| first_match(f, exceptions, root, now).is_none())
        .collect()
}

/// One audit record per suppressed finding, naming the exception that fired.
pub fn applied_exceptions(
    findings: &[Finding],
    exceptions: &[Exception],
    root: Option<&Path>,
    now: DateTime<Utc>,
) -> Vec<AppliedException> {
    findings
        .iter()
        .filter_map(|f| {
            first_match(f, exceptions, root, now).map(|e| AppliedException {
                rule: f.rule.clone(),
                file: f.file.clone(),
                reason: e.reason.clone(),
                owner: e.owner.clone(),
            })
        })
        .collect()
}
