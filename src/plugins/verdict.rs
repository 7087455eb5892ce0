//! Findings and the hybrid-enforcement verdict.
//!
//! Only ERROR findings block. WARNING findings are always reported and never
//! change the exit code.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Severity {
    Error,
    Warning,
}

impl FromStr for Severity {
    type Err = String;

    /// Configuration spelling only: `error` or `warning`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            other => Err(format!(
                "invalid severity '{}': expected 'error' or 'warning'",
                other
            )),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub message: String,
}

impl Finding {
    pub fn new(severity: Severity, rule: &str, file: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule: rule.to_string(),
            file: file.to_string(),
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Pass = 0,
    Violation = 1,
    RuntimeError = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Serialize for ExitCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

/// Audit record of one finding suppressed by an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedException {
    pub rule: String,
    pub file: String,
    pub reason: String,
    pub owner: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_exceptions: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub success: bool,
    pub exit_code: ExitCode,
    pub findings: Vec<Finding>,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_exceptions: Option<Vec<AppliedException>>,
}

impl CheckResult {
    pub fn pass() -> Self {
        build_check_result(Vec::new())
    }

    /// Result shape for the exit-2 path so `--json` callers always get the
    /// same contract.
    pub fn runtime_error(message: impl Into<String>) -> Self {
        let finding = Finding::new(Severity::Error, "runtime-error", "", message);
        Self {
            success: false,
            exit_code: ExitCode::RuntimeError,
            summary: Summary {
                total: 1,
                errors: 1,
                warnings: 0,
                applied_exceptions: None,
            },
            findings: vec![finding],
            applied_exceptions: None,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }
}

pub fn build_check_result(findings: Vec<Finding>) -> CheckResult {
    let errors = findings.iter().filter(|f| f.is_error()).count();
    let warnings = findings.len() - errors;
    let exit_code = if errors > 0 {
        ExitCode::Violation
    } else {
        ExitCode::Pass
    };
    CheckResult {
        success: exit_code == ExitCode::Pass,
        exit_code,
        summary: Summary {
            total: findings.len(),
            errors,
            warnings,
            applied_exceptions: None,
        },
        findings,
        applied_exceptions: None,
    }
}

/// Same rule as [`build_check_result`], over the post-filter findings, with
/// the suppression audit attached.
pub fn build_check_result_with_exceptions(
    findings: Vec<Finding>,
    applied: Vec<AppliedException>,
) -> CheckResult {
    let mut result = build_check_result(findings);
    result.summary.applied_exceptions = Some(applied.len());
    if !applied.is_empty() {
        result.applied_exceptions = Some(applied);
    }
    result
}
