//! CLI argument parsing via `clap`.

use crate::config::Overrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hookguard",
    version,
    about = "End-of-turn compliance hooks for coding agents",
    long_about = "Hookguard — lifecycle hooks that track edited files, scan them for forbidden/required patterns, and gate the turn on compiler errors.\n\nConfiguration precedence: CLI/env > hookguard.toml > defaults.",
    after_help = "Examples:\n  hookguard track < payload.json\n  hookguard scan --session-id abc123\n  hookguard gate --threshold 5\n  hookguard context < payload.json",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Clone, Debug, Default)]
/// Session options shared by every hook.
pub struct SessionArgs {
    #[arg(long, env = "CLAUDE_PROJECT_DIR", help = "Project root (default: payload cwd, then current dir)")]
    pub project_root: Option<PathBuf>,
    #[arg(long, env = "CLAUDE_SESSION_ID", help = "Session id (default: payload session_id, then 'default')")]
    pub session_id: Option<String>,
    #[arg(long, env = "HOOKGUARD_CACHE_ROOT", help = "Cache root relative to the project (default: .claude/tsc-cache)")]
    pub cache_root: Option<String>,
}

impl SessionArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            project_root: self.project_root.clone(),
            session_id: self.session_id.clone(),
            cache_root: self.cache_root.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
/// Supported subcommands, one per lifecycle hook.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current hookguard version.")]
    Version,
    /// Record a file edit
    #[command(
        about = "Record an edited file",
        long_about = "Append one record to the session edit log. Reads the PostToolUse payload from stdin unless --tool/--path are given. Never fails.",
        after_help = "Examples:\n  hookguard track < payload.json\n  hookguard track --tool Edit --path src/App.tsx"
    )]
    Track {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, help = "Tool name to record (overrides payload)")]
        tool: Option<String>,
        #[arg(long, help = "Edited path to record (overrides payload)")]
        path: Option<String>,
    },
    /// Scan edited files for rule violations
    #[command(
        about = "Run the compliance scan",
        long_about = "Check every file edited this session against the forbidden/required pattern rules. Advisory only: always exits 0.",
        after_help = "Examples:\n  hookguard scan\n  hookguard scan --output json"
    )]
    Scan {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Gate the turn on compiler errors
    #[command(
        about = "Run the compiler gate",
        long_about = "Run the compiler in check-only mode and classify by error count. Exits 1 when the count exceeds the threshold.",
        after_help = "Examples:\n  hookguard gate\n  hookguard gate --command 'npx tsc --noEmit -p app' --threshold 5"
    )]
    Gate {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, env = "HOOKGUARD_TSC_COMMAND", help = "Compiler command (default: npx tsc --noEmit)")]
        command: Option<String>,
        #[arg(long, env = "HOOKGUARD_THRESHOLD", help = "Errors tolerated before failing (default: 3)")]
        threshold: Option<String>,
        #[arg(long, env = "HOOKGUARD_TIMEOUT_SECS", help = "Compiler timeout in seconds (default: 120)")]
        timeout_secs: Option<String>,
    },
    /// Warn when the context window is nearly full
    #[command(
        about = "Check context usage",
        long_about = "Read the transcript named in the stdin payload and exit 2 with a warning once context usage crosses the threshold."
    )]
    Context {
        #[command(flatten)]
        session: SessionArgs,
    },
}
