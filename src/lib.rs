//! sdp-guard: scope, rule and governance gate for agent-driven edits.
//!
//! The guard answers two questions for a candidate edit or a batch of staged
//! changes: is the edit inside the declared workstream scope, and does the
//! changed content break a configured rule? It also refuses edits to its own
//! policy files unless a governance approval is on record.
//!
//! # Enforcement
//!
//! - ERROR findings block (exit 1). WARNING findings are reported only.
//! - Scope drift is always a WARNING. Governance findings are always ERROR
//!   and cannot be suppressed by exceptions.
//! - Runtime and configuration failures exit 2 and never degrade silently,
//!   except two deliberate fail-open paths: a failing git query means "no
//!   files", and a damaged state file means "inactive".
//!
//! # Project layout
//!
//! - `.sdp/state/guard-state.json`: active workstream (owner-only)
//! - `.sdp/guard-rules.yml`: rules and exceptions
//! - `.sdp/policy-approvals.yml`: governance approvals
//! - `.sdp/config.toml`: tool config
//! - `.sdp/log/guard-trace.jsonl`: trace log
//!
//! # Examples
//!
//! ```bash
//! sdp-guard activate 00-012-03
//! sdp-guard scope set src/parser.rs src/lexer.rs
//! sdp-guard check-edit src/parser.rs
//! sdp-guard check --json
//! sdp-guard deactivate
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: shared primitives (errors, state store, config, trace log)
//! - [`plugins`]: guard subsystems (rules, exceptions, governance, diff,
//!   orchestrator, verdict, review findings)

pub mod core;
pub mod plugins;

use crate::core::{
    config::{GuardConfig, OutputFormat},
    error, output, project, time,
    trace::{GuardLog, NullLog, TraceLog},
};
use crate::plugins::{
    diff::{CiRange, DiffMode, DiffSource, GitDiffSource, StaticDiffSource},
    guard::Guard,
    review,
    rules::{RuleHandler, RuleRegistry, RuleSet},
    verdict::{CheckResult, ExitCode},
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "sdp-guard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scope, rule, and governance gate for agent-driven edits"
)]
struct Cli {
    /// Emit machine-readable JSON instead of text.
    #[clap(long, global = true)]
    json: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Activate a workstream. Keeps any scope already declared.
    Activate {
        /// Workstream identifier (e.g. 00-012-03).
        ws_id: String,
    },
    /// Clear the active workstream.
    Deactivate,
    /// Show the active workstream, scope and review finding counts.
    Status,
    /// Manage the scope file list of the workstream.
    Scope(ScopeCli),
    /// Check whether a single edit is allowed (exit 0 allowed, 1 denied).
    CheckEdit {
        path: PathBuf,
    },
    /// Check staged changes, or the CI range from CI_BASE_SHA/CI_HEAD_SHA.
    Check {
        /// Check these files instead of asking git.
        #[clap(long, num_args = 1..)]
        files: Vec<PathBuf>,
    },
    /// Inspect the guard rule configuration.
    Rules(RulesCli),
    /// Track review findings against the workstream.
    Review(ReviewCli),
}

#[derive(clap::Args, Debug)]
struct ScopeCli {
    #[clap(subcommand)]
    command: ScopeCommand,
}

#[derive(Subcommand, Debug)]
enum ScopeCommand {
    /// Replace the scope with the given files.
    Set {
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove every scope restriction.
    Clear,
    /// Print the scope list.
    Show,
}

#[derive(clap::Args, Debug)]
struct RulesCli {
    #[clap(subcommand)]
    command: RulesCommand,
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Load the rule file and report what would run.
    Validate,
}

#[derive(clap::Args, Debug)]
struct ReviewCli {
    #[clap(subcommand)]
    command: ReviewCommand,
}

#[derive(Subcommand, Debug)]
enum ReviewCommand {
    /// Record a review finding.
    Add {
        #[clap(long)]
        feature: String,
        #[clap(long)]
        area: String,
        #[clap(long)]
        title: String,
        /// 0 (P0) through 3 (P3). P0 and P1 block until resolved.
        #[clap(long, default_value = "2")]
        priority: u8,
    },
    /// Mark a finding as being worked on.
    Start { id: String },
    /// Resolve a finding.
    Resolve {
        id: String,
        #[clap(long, default_value = "operator")]
        by: String,
    },
    /// List findings.
    List {
        /// Only unresolved P0/P1 findings.
        #[clap(long)]
        blocking: bool,
    },
}

struct Session {
    root: PathBuf,
    cwd: PathBuf,
    config: GuardConfig,
    log: Box<dyn GuardLog>,
    json: bool,
}

impl Session {
    fn open(json_flag: bool) -> Result<Self, error::GuardError> {
        let cwd = std::env::current_dir()?;
        let root = project::find_project_root(&cwd)?;
        let config = GuardConfig::load(&root)?;
        let log: Box<dyn GuardLog> = if config.trace.enabled {
            Box::new(TraceLog::new(config.trace_path(&root)))
        } else {
            Box::new(NullLog)
        };
        let json = json_flag || config.output.format == OutputFormat::Json;
        Ok(Self {
            root,
            cwd,
            config,
            log,
            json,
        })
    }

    fn guard(&self) -> Guard<'_> {
        Guard::new(&self.root, self.log.as_ref())
            .with_cwd(&self.cwd)
            .with_approvals_path(&self.config.approvals_path(&self.root))
    }

    fn rules(&self) -> Result<RuleSet, error::GuardError> {
        RuleSet::load(&self.root.join(project::RULES_FILE), &RuleRegistry::builtin())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), error::GuardError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parses arguments, runs the command and returns the process exit code.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;
    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            if json {
                let result = CheckResult::runtime_error(e.to_string());
                match serde_json::to_string_pretty(&result) {
                    Ok(text) => println!("{}", text),
                    Err(_) => eprintln!("{}", e),
                }
            } else {
                eprintln!("{} {}", "✗ error:".bright_red().bold(), e);
            }
            ExitCode::RuntimeError
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode, error::GuardError> {
    let session = Session::open(cli.json)?;
    let guard = session.guard();

    match cli.command {
        Command::Activate { ws_id } => {
            let state = guard.activate(&ws_id)?;
            if session.json {
                print_json(&time::command_envelope(
                    "activate",
                    "ok",
                    serde_json::json!({ "active_ws": state.active_ws, "activated_at": state.activated_at }),
                ))?;
            } else {
                println!(
                    "{} workstream {} activated",
                    "✓".bright_green(),
                    state.active_ws.bright_white().bold()
                );
            }
            Ok(ExitCode::Pass)
        }
        Command::Deactivate => {
            guard.deactivate()?;
            if session.json {
                print_json(&time::command_envelope("deactivate", "ok", serde_json::json!({})))?;
            } else {
                println!("{} guard deactivated", "✓".bright_green());
            }
            Ok(ExitCode::Pass)
        }
        Command::Status => {
            let status = guard.status();
            if session.json {
                print_json(&time::command_envelope(
                    "status",
                    "ok",
                    serde_json::to_value(&status)?,
                ))?;
            } else {
                println!("{}", output::render_status(&status));
            }
            Ok(ExitCode::Pass)
        }
        Command::Scope(scope) => run_scope(&session, &guard, scope.command),
        Command::CheckEdit { path } => {
            let decision = guard.check_edit(&path);
            if session.json {
                print_json(&decision)?;
            } else {
                println!("{}", output::render_edit_decision(&decision));
            }
            Ok(if decision.allowed {
                ExitCode::Pass
            } else {
                ExitCode::Violation
            })
        }
        Command::Check { files } => {
            let rules = session.rules()?;
            let label;
            let source: Box<dyn DiffSource> = if files.is_empty() {
                let mode = DiffMode::select(&CiRange::from_env());
                label = mode.label();
                Box::new(GitDiffSource::new(&session.root, mode))
            } else {
                label = "files";
                let files = files
                    .iter()
                    .map(|f| project::resolve_path(&session.cwd, f))
                    .collect();
                Box::new(StaticDiffSource::new(files))
            };
            let result = guard.staged_check(source.as_ref(), &rules)?;
            if session.json {
                print_json(&result)?;
            } else {
                println!("{} {}", "source:".bright_black(), label);
                println!("{}", output::render_check_result(&result));
            }
            Ok(result.exit_code)
        }
        Command::Rules(rules_cli) => match rules_cli.command {
            RulesCommand::Validate => run_rules_validate(&session),
        },
        Command::Review(review_cli) => run_review(&session, &guard, review_cli.command),
    }
}

fn run_scope(
    session: &Session,
    guard: &Guard<'_>,
    command: ScopeCommand,
) -> Result<ExitCode, error::GuardError> {
    let scope = match command {
        ScopeCommand::Set { files } => guard.set_scope(&files)?,
        ScopeCommand::Clear => {
            guard.clear_scope()?;
            Vec::new()
        }
        ScopeCommand::Show => guard.status().scope_files,
    };
    if session.json {
        print_json(&time::command_envelope(
            "scope",
            "ok",
            serde_json::json!({ "scope_files": scope }),
        ))?;
    } else if scope.is_empty() {
        println!("scope: unrestricted");
    } else {
        for f in &scope {
            println!("{}", f);
        }
    }
    Ok(ExitCode::Pass)
}

fn run_rules_validate(session: &Session) -> Result<ExitCode, error::GuardError> {
    let path = session.root.join(project::RULES_FILE);
    let registry = RuleRegistry::builtin();
    let rules = RuleSet::load(&path, &registry)?;

    if session.json {
        let listed: Vec<serde_json::Value> = rules
            .rules
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "enabled": r.enabled,
                    "severity": r.severity,
                    "external": matches!(registry.get(&r.id), Some(RuleHandler::External)),
                })
            })
            .collect();
        print_json(&time::command_envelope(
            "rules.validate",
            "ok",
            serde_json::json!({
                "path": display_rel(&session.root, &path),
                "version": rules.version,
                "rules": listed,
                "exceptions": rules.exceptions.len(),
            }),
        ))?;
        return Ok(ExitCode::Pass);
    }

    let source = if path.exists() {
        display_rel(&session.root, &path)
    } else {
        "built-in defaults".to_string()
    };
    println!("{} rules valid ({})", "✓".bright_green(), source);
    for rule in &rules.rules {
        let mut notes = Vec::new();
        if !rule.enabled {
            notes.push("disabled");
        }
        if matches!(registry.get(&rule.id), Some(RuleHandler::External)) {
            notes.push("external");
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };
        println!("  {} [{}]{}", rule.id, rule.severity, suffix);
    }
    println!("  {} exception(s)", rules.exceptions.len());
    Ok(ExitCode::Pass)
}

fn run_review(
    session: &Session,
    guard: &Guard<'_>,
    command: ReviewCommand,
) -> Result<ExitCode, error::GuardError> {
    let store = guard.store();
    match command {
        ReviewCommand::Add {
            feature,
            area,
            title,
            priority,
        } => {
            let id = review::add_finding(store, &feature, &area, &title, priority)?;
            if session.json {
                print_json(&time::command_envelope(
                    "review.add",
                    "ok",
                    serde_json::json!({ "id": id }),
                ))?;
            } else {
                println!("{} review finding recorded (ID: {})", "✓".bright_green(), id);
            }
        }
        ReviewCommand::Start { id } => {
            review::set_in_progress(store, &id)?;
            if session.json {
                print_json(&time::command_envelope(
                    "review.start",
                    "ok",
                    serde_json::json!({ "id": id, "review_status": "in_progress" }),
                ))?;
            } else {
                println!("{} review finding {} in progress", "✓".bright_green(), id);
            }
        }
        ReviewCommand::Resolve { id, by } => {
            review::resolve_finding(store, &id, &by)?;
            if session.json {
                print_json(&time::command_envelope(
                    "review.resolve",
                    "ok",
                    serde_json::json!({ "id": id, "review_status": "resolved", "resolved_by": by }),
                ))?;
            } else {
                println!("{} review finding {} resolved", "✓".bright_green(), id);
            }
        }
        ReviewCommand::List { blocking } => {
            let state = store.load();
            let findings: Vec<_> = if blocking {
                review::blocking_findings(&state)
            } else {
                state.findings.iter().collect()
            };
            if session.json {
                print_json(&time::command_envelope(
                    "review.list",
                    "ok",
                    serde_json::json!({ "findings": findings }),
                ))?;
            } else if findings.is_empty() {
                println!("no review findings");
            } else {
                for f in findings {
                    let marker = if f.is_blocking() {
                        "●".bright_red()
                    } else {
                        "○".normal()
                    };
                    println!(
                        "{} P{} {:?} {} [{}/{}] {}",
                        marker,
                        f.priority,
                        f.status,
                        f.id,
                        f.feature_id,
                        f.review_area,
                        output::compact_line(&f.title, 80)
                    );
                }
            }
        }
    }
    Ok(ExitCode::Pass)
}

fn display_rel(root: &Path, path: &Path) -> String {
    project::normalize_rel(root, path)
}
