//! Tool configuration read from `.sdp/config.toml`.
//!
//! A missing file means defaults. A file that exists but does not parse is a
//! configuration error; the guard refuses to run on a config it cannot read.

use crate::core::error::GuardError;
use crate::core::project;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    pub trace: TraceConfig,
    pub output: OutputConfig,
    pub governance: GovernanceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: project::TRACE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GovernanceConfig {
    pub approvals_path: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            approvals_path: project::APPROVALS_FILE.to_string(),
        }
    }
}

impl GuardConfig {
    pub fn load(project_root: &Path) -> Result<Self, GuardError> {
        let path = project_root.join(project::CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
            .map_err(|e| GuardError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, GuardError> {
        Ok(toml::from_str(content)?)
    }

    pub fn trace_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.trace.path)
    }

    pub fn approvals_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.governance.approvals_path)
    }
}
