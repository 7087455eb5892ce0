//! Project layout: root discovery and the fixed `.sdp/` paths.

use crate::core::error::GuardError;
use std::path::{Component, Path, PathBuf};

pub const SDP_DIR: &str = ".sdp";
pub const STATE_FILE: &str = ".sdp/state/guard-state.json";
pub const RULES_FILE: &str = ".sdp/guard-rules.yml";
pub const APPROVALS_FILE: &str = ".sdp/policy-approvals.yml";
pub const CONFIG_FILE: &str = ".sdp/config.toml";
pub const TRACE_FILE: &str = ".sdp/log/guard-trace.jsonl";

/// Walks up from `start_dir` to the nearest directory holding `.sdp/` or `.git`.
pub fn find_project_root(start_dir: &Path) -> Result<PathBuf, GuardError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(SDP_DIR).is_dir() || current_dir.join(".git").exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(GuardError::NotFound(format!(
                "no '{}' or '.git' found in {} or its parents",
                SDP_DIR,
                start_dir.display()
            )));
        }
    }
}

/// Joins `path` onto `base` when relative and folds `.`/`..` lexically.
///
/// The file does not need to exist, so this never touches the filesystem.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Root-relative, forward-slash form of `path` used for policy matching.
pub fn normalize_rel(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let text = rel.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}
