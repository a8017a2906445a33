//! Warden CLI: gate commands and operations through the permission engine.

mod prompt;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use prompt::{InputLines, TerminalPromptHandler};
use warden_config::{CliOverrides, WardenConfig};
use warden_permissions::{
    Classification, DecisionGate, FileOperation, GitOperation, OperationKind, PermissionDecision,
    PermissionRequest, PromptHandler, build_command_request, build_file_request, build_git_request,
};

/// Exit status when the gate denies the operation.
const EXIT_DENIED: u8 = 2;

#[derive(Parser)]
#[command(name = "warden", version, about = "Permission gate for agent-initiated operations")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Grant an operation kind for the whole session (repeatable)
    #[arg(long = "grant", value_name = "KIND", global = true)]
    grants: Vec<OperationKind>,

    /// Start with batch approval enabled
    #[arg(long, global = true)]
    batch: bool,

    /// Ask in the terminal before denying CAUTION/DANGER operations
    #[arg(long, global = true)]
    interactive: bool,

    /// Time allowed to answer a confirmation prompt, in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    prompt_timeout_ms: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show how a shell command is classified, without deciding it
    Classify {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Decide whether a shell command may run
    Check {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Decide a file operation (create, read, edit, delete)
    File {
        operation: FileOperation,
        path: PathBuf,
        /// New file content, shown as the preview
        #[arg(long)]
        content: Option<String>,
    },
    /// Decide a git operation (clone, commit, push, pull)
    Git {
        operation: GitOperation,
        repository: String,
        /// Files touched by the operation
        files: Vec<PathBuf>,
        /// Commit message, shown as the preview
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Read commands from stdin and gate each one
    Session,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = WardenConfig::load(CliOverrides {
        session_grants: cli.grants,
        batch_approval: cli.batch.then_some(true),
        prompt_timeout_ms: cli.prompt_timeout_ms,
    })
    .context("Failed to load configuration")?;
    tracing::debug!(
        config_dir = %config.config_dir.display(),
        batch_approval = config.batch_approval,
        grants = config.session_grants.len(),
        rules = config.command_rules.len(),
        "configuration loaded"
    );

    let input = (cli.interactive || matches!(cli.command, Command::Session))
        .then(InputLines::stdin);
    let prompt_handler: Option<Arc<dyn PromptHandler>> = match (&input, cli.interactive) {
        (Some(input), true) => Some(Arc::new(TerminalPromptHandler::new(input.clone()))),
        _ => None,
    };
    let gate = config.build_gate(prompt_handler);
    let printer = Printer { json: cli.json };

    match cli.command {
        Command::Classify { command } => {
            let command = command.join(" ");
            printer.classification(&command, &gate.classifier().explain(&command))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { command } => {
            let request = build_command_request(&command.join(" "), gate.classifier());
            gate_request(&gate, &printer, &request).await
        }
        Command::File {
            operation,
            path,
            content,
        } => {
            let request = build_file_request(operation, &path, content.as_deref());
            gate_request(&gate, &printer, &request).await
        }
        Command::Git {
            operation,
            repository,
            files,
            message,
        } => {
            let request = build_git_request(operation, &repository, files, message.as_deref());
            gate_request(&gate, &printer, &request).await
        }
        Command::Session => {
            let input = input.unwrap_or_else(InputLines::stdin);
            session(&gate, &printer, &input).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn gate_request(
    gate: &DecisionGate,
    printer: &Printer,
    request: &PermissionRequest,
) -> Result<ExitCode> {
    let decision = gate.decide_interactive(request).await;
    printer.decision(&decision)?;
    Ok(if decision.approved {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DENIED)
    })
}

async fn session(gate: &DecisionGate, printer: &Printer, input: &InputLines) -> Result<()> {

    eprintln!(
        "warden v{} (batch: {}, grants: {})",
        env!("CARGO_PKG_VERSION"),
        on_off(gate.is_batch_approval_active()),
        format_kinds(&gate.granted_kinds()),
    );
    eprintln!("Type a command to check it. /help for session commands, Ctrl+D to exit.\n");

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let Some(line) = input.next_line().await else {
            eprintln!();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(handled) = handle_slash_command(input, gate, printer)? {
            match handled {
                SlashResult::Continue => continue,
                SlashResult::Break => break,
                SlashResult::Unknown => {
                    eprintln!("Unknown command: {input}. Type /help for available commands.");
                    continue;
                }
            }
        }

        let decision = gate.check_command_interactive(input).await;
        printer.decision(&decision)?;
    }

    Ok(())
}

enum SlashResult {
    Continue,
    Break,
    Unknown,
}

fn handle_slash_command(
    input: &str,
    gate: &DecisionGate,
    printer: &Printer,
) -> Result<Option<SlashResult>> {
    if !input.starts_with('/') {
        return Ok(None);
    }

    let (cmd, args) = match input.split_once(' ') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (input, None),
    };

    let result = match (cmd, args) {
        ("/quit" | "/exit", _) => SlashResult::Break,
        ("/help", _) => {
            print_help();
            SlashResult::Continue
        }
        ("/grant", Some(kind)) => {
            match kind.parse::<OperationKind>() {
                Ok(kind) => {
                    gate.grant_session_permission(kind);
                    eprintln!("Granted {kind} for this session.");
                }
                Err(e) => eprintln!("{e}"),
            }
            SlashResult::Continue
        }
        ("/revoke", Some(kind)) => {
            match kind.parse::<OperationKind>() {
                Ok(kind) => {
                    gate.revoke_session_permission(kind);
                    eprintln!("Revoked {kind}.");
                }
                Err(e) => eprintln!("{e}"),
            }
            SlashResult::Continue
        }
        ("/batch", Some("on")) => {
            gate.enable_batch_approval();
            eprintln!("Batch approval ON: every non-forbidden request is approved.");
            SlashResult::Continue
        }
        ("/batch", Some("off")) => {
            gate.disable_batch_approval();
            eprintln!("Batch approval off.");
            SlashResult::Continue
        }
        ("/clear", _) => {
            gate.clear_session();
            eprintln!("Session grants cleared, batch approval off.");
            SlashResult::Continue
        }
        ("/status", _) => {
            eprintln!(
                "batch: {}, grants: {}",
                on_off(gate.is_batch_approval_active()),
                format_kinds(&gate.granted_kinds())
            );
            SlashResult::Continue
        }
        ("/audit", None) => {
            printer.audit(&gate.audit_trail())?;
            SlashResult::Continue
        }
        ("/audit", Some(kind)) => {
            match kind.parse::<OperationKind>() {
                Ok(kind) => printer.audit(&gate.decisions_for_kind(kind))?,
                Err(e) => eprintln!("{e}"),
            }
            SlashResult::Continue
        }
        ("/pending", _) => {
            match gate.pending_request() {
                Some(request) => printer.pending(&request)?,
                None => eprintln!("No pending request."),
            }
            SlashResult::Continue
        }
        _ => SlashResult::Unknown,
    };
    Ok(Some(result))
}

fn print_help() {
    eprintln!("Session commands:");
    eprintln!("  /grant <kind>    Approve every request of <kind> for this session");
    eprintln!("  /revoke <kind>   Remove a session grant");
    eprintln!("  /batch on|off    Toggle batch approval (forbidden operations stay blocked)");
    eprintln!("  /clear           Drop all grants and leave batch mode");
    eprintln!("  /status          Show grants and batch mode");
    eprintln!("  /audit [kind]    Show the audit trail, optionally for one kind");
    eprintln!("  /pending         Show the most recent request awaiting confirmation");
    eprintln!("  /quit            Exit");
    eprintln!();
    let kinds: Vec<&str> = OperationKind::ALL.iter().map(|k| k.as_str()).collect();
    eprintln!("Kinds: {}", kinds.join(", "));
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn format_kinds(kinds: &[OperationKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders results as plain text or JSON on stdout.
struct Printer {
    json: bool,
}

impl Printer {
    fn classification(&self, command: &str, c: &Classification) -> Result<()> {
        if self.json {
            let value = serde_json::json!({
                "command": command,
                "kind": c.kind,
                "level": c.level,
                "rule": c.rule,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{} {} ({})", c.level, c.kind, c.rule);
        }
        Ok(())
    }

    fn decision(&self, decision: &PermissionDecision) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(decision)?);
        } else {
            let verdict = if decision.approved { "approved" } else { "denied" };
            println!(
                "{verdict}: {} ({})",
                decision.action,
                decision.reason.as_deref().unwrap_or("no reason recorded")
            );
        }
        Ok(())
    }

    fn audit(&self, trail: &[PermissionDecision]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(trail)?);
            return Ok(());
        }
        if trail.is_empty() {
            eprintln!("Audit trail is empty.");
        }
        for d in trail {
            println!(
                "{} {:<8} {:<16} {} ({})",
                d.timestamp.format("%H:%M:%S"),
                if d.approved { "approved" } else { "denied" },
                d.kind.as_str(),
                d.action,
                d.reason.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    fn pending(&self, request: &PermissionRequest) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(request)?);
        } else {
            println!(
                "[{}] {} ({})",
                request.warning_level(),
                request.action(),
                request.kind()
            );
            if let Some(preview) = request.preview() {
                println!("{preview}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> DecisionGate {
        DecisionGate::default()
    }

    fn printer() -> Printer {
        Printer { json: false }
    }

    #[test]
    fn test_cli_parses_check_with_hyphen_args() {
        let cli = Cli::try_parse_from(["warden", "check", "rm", "-rf", "/"]).unwrap();
        match cli.command {
            Command::Check { command } => assert_eq!(command.join(" "), "rm -rf /"),
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_cli_parses_grants() {
        let cli = Cli::try_parse_from([
            "warden", "--grant", "git_push", "--grant", "file-edit", "session",
        ])
        .unwrap();
        assert_eq!(cli.grants, vec![OperationKind::GitPush, OperationKind::FileEdit]);
    }

    #[test]
    fn test_cli_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["warden", "--grant", "teleport", "session"]).is_err());
    }

    #[test]
    fn test_cli_parses_git() {
        let cli = Cli::try_parse_from([
            "warden", "git", "commit", "/repo", "a.rs", "b.rs", "-m", "wip",
        ])
        .unwrap();
        match cli.command {
            Command::Git {
                operation,
                files,
                message,
                ..
            } => {
                assert_eq!(operation, GitOperation::Commit);
                assert_eq!(files.len(), 2);
                assert_eq!(message.as_deref(), Some("wip"));
            }
            _ => panic!("expected git"),
        }
    }

    #[test]
    fn test_slash_grant_and_batch() {
        let gate = gate();
        handle_slash_command("/grant git_push", &gate, &printer()).unwrap();
        assert!(gate.has_session_permission(OperationKind::GitPush));

        handle_slash_command("/batch on", &gate, &printer()).unwrap();
        assert!(gate.is_batch_approval_active());

        handle_slash_command("/clear", &gate, &printer()).unwrap();
        assert!(!gate.is_batch_approval_active());
        assert!(gate.granted_kinds().is_empty());
    }

    #[test]
    fn test_slash_non_command_and_unknown() {
        let gate = gate();
        assert!(handle_slash_command("ls -la", &gate, &printer()).unwrap().is_none());
        assert!(matches!(
            handle_slash_command("/frobnicate", &gate, &printer()).unwrap(),
            Some(SlashResult::Unknown)
        ));
        assert!(matches!(
            handle_slash_command("/quit", &gate, &printer()).unwrap(),
            Some(SlashResult::Break)
        ));
    }

    #[test]
    fn test_format_kinds() {
        assert_eq!(format_kinds(&[]), "none");
        assert_eq!(
            format_kinds(&[OperationKind::GitPush, OperationKind::FileEdit]),
            "git_push, file_edit"
        );
    }
}
