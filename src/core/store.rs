//! Guard state and its on-disk store.
//!
//! One record describes the active workstream. It lives at a fixed
//! project-relative path, is written atomically with owner-only permissions,
//! and is read fail-open: a missing or damaged file reads back as the
//! inactive default.

use crate::core::error::GuardError;
use crate::core::project;
use crate::core::time;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Activation lifetime. Past this the state reads as inactive.
pub const ACTIVATION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Open,
    InProgress,
    Resolved,
}

/// A review issue raised against the active workstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub id: String,
    pub feature_id: String,
    pub review_area: String,
    pub title: String,
    /// 0 = P0 (most severe) through 3 = P3.
    pub priority: u8,
    pub status: ReviewStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl ReviewFinding {
    pub fn is_blocking(&self) -> bool {
        self.priority <= 1 && self.status != ReviewStatus::Resolved
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardState {
    pub active_ws: String,
    pub activated_at: String,
    /// Absolute paths. Empty means no scope restriction.
    pub scope_files: Vec<String>,
    pub findings: Vec<ReviewFinding>,
}

impl GuardState {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(time::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.active_ws.is_empty() {
            return true;
        }
        match time::parse_timestamp(&self.activated_at) {
            Some(activated) => now - activated > Duration::hours(ACTIVATION_TTL_HOURS),
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(project::STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, state: &GuardState) -> Result<(), GuardError> {
        let parent = self.path.parent().ok_or_else(|| {
            GuardError::ValidationError(format!(
                "state path has no parent directory: {}",
                self.path.display()
            ))
        })?;
        fs::create_dir_all(parent)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "guard-state.json".to_string());
        let tmp_path = parent.join(format!(".{}.tmp", file_name));

        let json = serde_json::to_string_pretty(state)?;
        let mut file = open_owner_only(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Never fails: absent or unparsable state is the inactive default.
    pub fn load(&self) -> GuardState {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return GuardState::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    pub fn clear(&self) -> Result<(), GuardError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GuardError::IoError(e)),
        }
    }
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> Result<fs::File, GuardError> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // Also resets the bits of a temp file left by an earlier run.
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> Result<fs::File, GuardError> {
    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}
