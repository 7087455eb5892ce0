//! Compact output rendering helpers for CLI surfaces.
//!
//! Keeps command result output bounded and readable while preserving signal.

use crate::plugins::guard::{EditDecision, GuardStatus};
use crate::plugins::verdict::{CheckResult, ExitCode, Finding, Severity};
use colored::Colorize;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

pub fn finding_location(finding: &Finding) -> String {
    match (finding.line, finding.column) {
        (Some(line), Some(col)) => format!("{}:{}:{}", finding.file, line, col),
        (Some(line), None) => format!("{}:{}", finding.file, line),
        _ => finding.file.clone(),
    }
}

pub fn render_finding(finding: &Finding) -> String {
    let tag = match finding.severity {
        Severity::Error => "ERROR".bright_red().bold(),
        Severity::Warning => "WARN ".bright_yellow().bold(),
    };
    format!(
        "{} [{}] {} {}",
        tag,
        finding.rule.bright_white(),
        finding_location(finding),
        compact_line(&finding.message, 160)
    )
}

pub fn render_check_result(result: &CheckResult) -> String {
    let mut lines: Vec<String> = result.findings.iter().map(render_finding).collect();
    if let Some(applied) = &result.applied_exceptions {
        for a in applied {
            lines.push(format!(
                "{} [{}] {} (owner: {}, reason: {})",
                "SKIP ".bright_blue(),
                a.rule,
                a.file,
                a.owner,
                compact_line(&a.reason, 80)
            ));
        }
    }
    let verdict = match result.exit_code {
        ExitCode::Pass => "✓ guard check passed".bright_green().bold(),
        ExitCode::Violation => "✗ guard check failed".bright_red().bold(),
        ExitCode::RuntimeError => "✗ guard check could not run".bright_red().bold(),
    };
    let mut summary = format!(
        "{} ({} findings: {} errors, {} warnings",
        verdict, result.summary.total, result.summary.errors, result.summary.warnings
    );
    if let Some(n) = result.summary.applied_exceptions {
        summary.push_str(&format!(", {} suppressed", n));
    }
    summary.push(')');
    lines.push(summary);
    lines.join("\n")
}

pub fn render_edit_decision(decision: &EditDecision) -> String {
    let verdict = if decision.allowed {
        "✓ allowed".bright_green().bold()
    } else {
        "✗ denied".bright_red().bold()
    };
    format!("{} {}: {}", verdict, decision.path, decision.reason)
}

pub fn render_status(status: &GuardStatus) -> String {
    let mut lines = Vec::new();
    if status.active_ws.is_empty() {
        lines.push(format!("{} no active workstream", "ℹ".bright_blue()));
    } else if status.expired {
        lines.push(format!(
            "{} workstream {} expired (activated {})",
            "⚠".bright_yellow(),
            status.active_ws,
            status.activated_at
        ));
    } else {
        lines.push(format!(
            "{} workstream {} active since {}",
            "✓".bright_green(),
            status.active_ws.bright_white().bold(),
            status.activated_at
        ));
    }
    if status.scope_files.is_empty() {
        lines.push("  scope: unrestricted".to_string());
    } else {
        lines.push(format!("  scope: {} file(s)", status.scope_files.len()));
        for f in &status.scope_files {
            lines.push(format!("    {}", f));
        }
    }
    lines.push(format!(
        "  review findings: {} ({} blocking)",
        status.review_findings, status.blocking_findings
    ));
    lines.join("\n")
}
