//! Guard trace log.
//!
//! Callers hand a `&dyn GuardLog` to the orchestrator instead of relying on a
//! process-wide logger, so several guards can live in one process without
//! sharing output.

use crate::core::error::GuardError;
use crate::core::time;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub trace_id: String,
    pub ts: String,
    pub actor: String,
    pub op: String,
    pub request: Value,
    pub response: Value,
}

impl TraceEvent {
    pub fn new(op: &str, request: Value, response: Value) -> Self {
        Self {
            trace_id: time::new_event_id(),
            ts: time::now_rfc3339(),
            actor: "sdp-guard".to_string(),
            op: op.to_string(),
            request,
            response,
        }
    }
}

pub trait GuardLog {
    fn record(&self, event: TraceEvent) -> Result<(), GuardError>;
}

/// Appends redacted events as JSON lines.
#[derive(Debug, Clone)]
pub struct TraceLog {
    path: PathBuf,
}

impl TraceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GuardLog for TraceLog {
    fn record(&self, event: TraceEvent) -> Result<(), GuardError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let redacted_event = TraceEvent {
            request: redact(event.request),
            response: redact(event.response),
            ..event
        };

        let json = serde_json::to_string(&redacted_event)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl GuardLog for NullLog {
    fn record(&self, _event: TraceEvent) -> Result<(), GuardError> {
        Ok(())
    }
}

/// Keeps events in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: RefCell<Vec<TraceEvent>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.events.borrow().iter().map(|e| e.op.clone()).collect()
    }
}

impl GuardLog for MemoryLog {
    fn record(&self, event: TraceEvent) -> Result<(), GuardError> {
        self.events.borrow_mut().push(event);
        Ok(())
    }
}

/// Patterns that detect secrets in string content.
static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    let table: [(&str, &'static str); 5] = [
        (
            r"(A3T[A-Z0-9]|AKIA|AGPA|AIDA|AROA|AIPA|ANPA|ANVA|ASIA)[0-9A-Z]{16}",
            "[AWS_KEY_REDACTED]",
        ),
        (
            r"(ghp|gho|ghu|ghs|ghr)_[a-zA-Z0-9_]{36,255}",
            "[GITHUB_TOKEN_REDACTED]",
        ),
        (r"(?i)bearer\s+[a-zA-Z0-9_\-\.]{20,}", "[BEARER_REDACTED]"),
        (
            r"-----BEGIN (?:RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----",
            "[PEM_KEY_REDACTED]",
        ),
        (
            r#"(?i)(password|passwd|pwd)['"]?\s*[:=]\s*['"]?[^\s'"]{8,}['"]?"#,
            "[PASSWORD_REDACTED]",
        ),
    ];
    table
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
});

/// Redact secrets from a plain string value.
pub fn redact_string(input: &str) -> String {
    let mut result = input.to_string();
    for (pattern, replacement) in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Recursively redact a JSON value. Sensitive-looking keys are blanked
/// wholesale; string values are scanned for secret patterns.
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted_map = Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if lower_key.contains("token")
                    || lower_key.contains("secret")
                    || lower_key.contains("password")
                {
                    redacted_map.insert(key, Value::String("[REDACTED]".to_string()));
                } else {
                    redacted_map.insert(key, redact(val));
                }
            }
            Value::Object(redacted_map)
        }
        Value::Array(vec) => Value::Array(vec.into_iter().map(redact).collect()),
        Value::String(s) => Value::String(redact_string(&s)),
        other => other,
    }
}
