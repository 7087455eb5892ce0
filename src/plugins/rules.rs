//! Rule engine.
//!
//! Rules come from `.sdp/guard-rules.yml` and are dispatched through a
//! registry of checkers. Every configured rule ID must be registered; an
//! unknown ID fails the load instead of being skipped. Rules that need
//! external analysis are registered as `External` and never run here.
//!
//! ```yaml
//! version: 1
//! rules:
//!   - id: max-file-loc
//!     enabled: true
//!     severity: error
//!     config:
//!       max_lines: 200
//! exceptions:
//!   - rule_id: max-file-loc
//!     file: "src/legacy/*.rs"
//!     reason: split scheduled for next workstream
//!     owner: platform
//!     expires_at: 2026-12-31
//! ```

use crate::core::error::GuardError;
use crate::plugins::exceptions::Exception;
use crate::plugins::verdict::{Finding, Severity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

pub const MAX_FILE_LOC: &str = "max-file-loc";
pub const NO_COMMENTED_CODE: &str = "no-commented-code";
pub const NO_ORPHANED_TODOS: &str = "no-orphaned-todos";
pub const COVERAGE_THRESHOLD: &str = "coverage-threshold";
pub const MAX_CYCLOMATIC_COMPLEXITY: &str = "max-cyclomatic-complexity";

pub const DEFAULT_MAX_LINES: u64 = 200;

/// Consecutive long comment lines that count as a commented-out block.
const COMMENT_RUN_LIMIT: usize = 3;
/// Comment lines this short (trimmed) never count.
const SHORT_COMMENT_CHARS: usize = 10;

pub type RuleCheck = fn(&str, &str, &GuardRule) -> Vec<Finding>;

#[derive(Clone, Copy)]
pub enum RuleHandler {
    Check(RuleCheck),
    /// Recognized, but evaluated by external tooling.
    External,
}

impl std::fmt::Debug for RuleHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Check(_) => write!(f, "Check"),
            Self::External => write!(f, "External"),
        }
    }
}

pub(crate) struct RuleEntry {
    pub id: &'static str,
    pub handler: RuleHandler,
}

pub(crate) const BUILTIN_RULES: &[RuleEntry] = &[
    RuleEntry { id: MAX_FILE_LOC, handler: RuleHandler::Check(check_max_file_loc) },
    RuleEntry { id: NO_COMMENTED_CODE, handler: RuleHandler::Check(check_no_commented_code) },
    RuleEntry { id: NO_ORPHANED_TODOS, handler: RuleHandler::Check(check_no_orphaned_todos) },
    RuleEntry { id: COVERAGE_THRESHOLD, handler: RuleHandler::External },
    RuleEntry { id: MAX_CYCLOMATIC_COMPLEXITY, handler: RuleHandler::External },
];

#[derive(Debug, Clone)]
pub struct RuleRegistry {
    handlers: BTreeMap<String, RuleHandler>,
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for entry in BUILTIN_RULES {
            registry.register(entry.id, entry.handler);
        }
        registry
    }

    pub fn register(&mut self, id: &str, handler: RuleHandler) {
        self.handlers.insert(id.to_string(), handler);
    }

    pub fn get(&self, id: &str) -> Option<RuleHandler> {
        self.handlers.get(id).copied()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRule {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub severity: Severity,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl GuardRule {
    pub fn new(id: &str, severity: Severity) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
            severity,
            config: BTreeMap::new(),
        }
    }

    /// Positive integer parameter; `Ok(None)` when absent.
    pub fn config_u64(&self, key: &str) -> Result<Option<u64>, String> {
        let Some(value) = self.config.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n > 0 => Ok(Some(n)),
            _ => Err(format!(
                "rule '{}': config.{} must be a positive integer, got {}",
                self.id, key, value
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    version: u32,
    #[serde(default)]
    rules: Vec<GuardRule>,
    #[serde(default)]
    exceptions: Vec<Exception>,
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    pub version: u32,
    pub rules: Vec<GuardRule>,
    pub exceptions: Vec<Exception>,
    handlers: Vec<RuleHandler>,
}

impl RuleSet {
    /// Rules used when no rule file exists.
    pub fn defaults() -> Self {
        let registry = RuleRegistry::builtin();
        let rules = vec![
            GuardRule::new(MAX_FILE_LOC, Severity::Error),
            GuardRule::new(NO_COMMENTED_CODE, Severity::Warning),
            GuardRule::new(NO_ORPHANED_TODOS, Severity::Warning),
        ];
        let handlers = rules
            .iter()
            .filter_map(|r| registry.get(&r.id))
            .collect();
        Self {
            version: 1,
            rules,
            exceptions: Vec::new(),
            handlers,
        }
    }

    pub fn load(path: &Path, registry: &RuleRegistry) -> Result<Self, GuardError> {
        if !path.exists() {
            return Ok(Self::defaults());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, registry)
            .map_err(|e| GuardError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str, registry: &RuleRegistry) -> Result<Self, GuardError> {
        let file: RulesFile = serde_yaml::from_str(content)?;
        Self::from_parts(file.version, file.rules, file.exceptions, registry)
    }

    pub fn from_parts(
        version: u32,
        rules: Vec<GuardRule>,
        exceptions: Vec<Exception>,
        registry: &RuleRegistry,
    ) -> Result<Self, GuardError> {
        if version < 1 {
            return Err(GuardError::ConfigError(format!(
                "rules version must be >= 1, got {}",
                version
            )));
        }

        let mut handlers = Vec::with_capacity(rules.len());
        for (idx, rule) in rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(GuardError::ConfigError(format!(
                    "rule #{} has an empty id",
                    idx + 1
                )));
            }
            let handler = registry.get(&rule.id).ok_or_else(|| {
                GuardError::ConfigError(format!("unknown rule id '{}'", rule.id))
            })?;
            validate_rule_config(rule).map_err(GuardError::ConfigError)?;
            handlers.push(handler);
        }

        Ok(Self {
            version,
            rules,
            exceptions,
            handlers,
        })
    }

    /// Findings of every enabled in-process rule for one file, in
    /// configured rule order.
    pub fn evaluate(&self, file: &str, content: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (rule, handler) in self.rules.iter().zip(&self.handlers) {
            if !rule.enabled {
                continue;
            }
            if let RuleHandler::Check(check) = handler {
                findings.extend(check(file, content, rule));
            }
        }
        findings
    }
}

fn validate_rule_config(rule: &GuardRule) -> Result<(), String> {
    if rule.id == MAX_FILE_LOC {
        rule.config_u64("max_lines")?;
    }
    Ok(())
}

pub fn check_max_file_loc(file: &str, content: &str, rule: &GuardRule) -> Vec<Finding> {
    let threshold = rule
        .config_u64("max_lines")
        .ok()
        .flatten()
        .unwrap_or(DEFAULT_MAX_LINES);
    let line_count = content.lines().count() as u64;
    if line_count <= threshold {
        return Vec::new();
    }
    vec![Finding::new(
        rule.severity,
        &rule.id,
        file,
        format!(
            "file has {} lines, exceeding the limit of {}",
            line_count, threshold
        ),
    )]
}

pub fn check_no_commented_code(file: &str, content: &str, rule: &GuardRule) -> Vec<Finding> {
    let prefix = if file.ends_with(".py") { "#" } else { "//" };
    let mut run = 0usize;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        let counts = trimmed.starts_with(prefix)
            && trimmed.chars().count() > SHORT_COMMENT_CHARS
            && !is_annotation(trimmed);
        if !counts {
            run = 0;
            continue;
        }
        run += 1;
        if run >= COMMENT_RUN_LIMIT {
            return vec![
                Finding::new(
                    rule.severity,
                    &rule.id,
                    file,
                    format!(
                        "{} consecutive comment lines look like commented-out code",
                        COMMENT_RUN_LIMIT
                    ),
                )
                .at_line(idx + 1),
            ];
        }
    }
    Vec::new()
}

fn is_annotation(line: &str) -> bool {
    line.contains("TODO") || line.contains("FIXME") || line.contains("NOTE")
}

static WS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:WS|ws)-[A-Za-z0-9-]{6,}").expect("valid ws token regex"));

/// True when the line carries a workstream reference such as `WS-063-03`.
pub fn has_workstream_ref(line: &str) -> bool {
    WS_TOKEN
        .find_iter(line)
        .any(|m| m.as_str().matches('-').count() >= 2)
}

pub fn check_no_orphaned_todos(file: &str, content: &str, rule: &GuardRule) -> Vec<Finding> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains("TODO") && !has_workstream_ref(line))
        .map(|(idx, _)| {
            Finding::new(
                rule.severity,
                &rule.id,
                file,
                "TODO without a workstream reference (e.g. TODO(WS-063-01))",
            )
            .at_line(idx + 1)
        })
        .collect()
}
