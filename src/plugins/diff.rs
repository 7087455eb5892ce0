//! Diff source: which files a check looks at.
//!
//! Local mode asks git for the staged set. CI mode diffs an explicit commit
//! range taken from `CI_BASE_SHA`/`CI_HEAD_SHA`. Each endpoint must be exactly
//! 40 hex characters before it is passed to git; anything else is dropped as
//! if unset. CI mode needs both endpoints, so a half-valid range falls back
//! to local mode.
//!
//! Paths come back relative to the project root (`--relative`), so a project
//! nested below the git top level sees its own files. Deletions are part of
//! the set and renames are split into a deletion plus an addition; the rule
//! engine skips missing files, the governance gate still sees them.
//!
//! A failing git query yields an empty file set, never an error.

use std::path::{Path, PathBuf};
use std::process::Command;

pub const CI_BASE_ENV: &str = "CI_BASE_SHA";
pub const CI_HEAD_ENV: &str = "CI_HEAD_SHA";

pub trait DiffSource {
    /// Absolute paths of the changed files.
    fn changed_files(&self) -> Vec<PathBuf>;
}

pub fn is_valid_sha(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiRange {
    pub base: Option<String>,
    pub head: Option<String>,
}

impl CiRange {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let valid = |key: &str| lookup(key).filter(|v| is_valid_sha(v));
        Self {
            base: valid(CI_BASE_ENV),
            head: valid(CI_HEAD_ENV),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffMode {
    Local,
    Ci { base: String, head: String },
}

impl DiffMode {
    pub fn select(range: &CiRange) -> Self {
        match (&range.base, &range.head) {
            (Some(base), Some(head)) => Self::Ci {
                base: base.clone(),
                head: head.clone(),
            },
            _ => Self::Local,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "staged",
            Self::Ci { .. } => "ci-range",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitDiffSource {
    root: PathBuf,
    mode: DiffMode,
}

impl GitDiffSource {
    pub fn new(root: &Path, mode: DiffMode) -> Self {
        Self {
            root: root.to_path_buf(),
            mode,
        }
    }

    fn git_args(&self) -> Vec<String> {
        let mut args = vec![
            "-C".to_string(),
            self.root.to_string_lossy().to_string(),
            "diff".to_string(),
        ];
        match &self.mode {
            DiffMode::Local => args.push("--cached".to_string()),
            DiffMode::Ci { .. } => {}
        }
        for flag in ["--name-only", "--relative", "--no-renames", "-z", "--diff-filter=ACMD"] {
            args.push(flag.to_string());
        }
        if let DiffMode::Ci { base, head } = &self.mode {
            args.push(base.clone());
            args.push(head.clone());
        }
        args
    }
}

impl DiffSource for GitDiffSource {
    fn changed_files(&self) -> Vec<PathBuf> {
        let output = match Command::new("git").args(self.git_args()).output() {
            Ok(output) => output,
            Err(_) => return Vec::new(),
        };
        if !output.status.success() {
            return Vec::new();
        }
        parse_name_list(&output.stdout)
            .into_iter()
            .map(|rel| self.root.join(rel))
            .collect()
    }
}

/// Splits NUL-terminated `-z` output into unquoted path names.
fn parse_name_list(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|b| *b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| String::from_utf8_lossy(name).to_string())
        .collect()
}

/// Fixed file list, for `check --files` and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticDiffSource {
    files: Vec<PathBuf>,
}

impl StaticDiffSource {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl DiffSource for StaticDiffSource {
    fn changed_files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }
}
