//! Compiler gate: run a check-only compile, count error lines, classify.
//!
//! Bands are a pure function of the error count and threshold:
//! - `0` errors: pass
//! - `1..=threshold`: warn (does not block)
//! - `> threshold`: fail (exit code 1)
//!
//! A compiler that cannot be spawned or does not finish within the timeout
//! is a tooling failure and never blocks the turn.

use crate::config::GateSettings;
use crate::session::SessionContext;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Diagnostic lines shown for the warn band.
pub const WARN_EXCERPT: usize = 10;
/// Diagnostic lines shown for the fail band.
pub const FAIL_EXCERPT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Pass,
    Warn,
    Fail,
}

impl Band {
    pub fn exit_code(&self) -> i32 {
        match self {
            Band::Pass | Band::Warn => 0,
            Band::Fail => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    TimedOut,
    SpawnFailed,
}

#[derive(Debug, Clone, Serialize)]
/// One gate invocation.
pub struct CompileRun {
    pub command: String,
    pub raw_output: String,
    pub status: RunStatus,
    /// Why the run was skipped, for timed-out or unspawnable commands.
    pub notice: Option<String>,
    pub error_count: usize,
    pub threshold: usize,
    pub band: Band,
    /// Matching diagnostic lines, in output order.
    pub errors: Vec<String>,
    pub cache_file: String,
}

impl CompileRun {
    /// Lines to print for the current band.
    pub fn excerpt(&self) -> &[String] {
        let cap = match self.band {
            Band::Pass => 0,
            Band::Warn => WARN_EXCERPT,
            Band::Fail => FAIL_EXCERPT,
        };
        &self.errors[..self.errors.len().min(cap)]
    }
}

pub fn classify(error_count: usize, threshold: usize) -> Band {
    if error_count == 0 {
        Band::Pass
    } else if error_count <= threshold {
        Band::Warn
    } else {
        Band::Fail
    }
}

/// Lines of `output` containing `signature`.
pub fn error_lines(output: &str, signature: &str) -> Vec<String> {
    if signature.is_empty() {
        return Vec::new();
    }
    output
        .lines()
        .filter(|l| l.contains(signature))
        .map(|l| l.to_string())
        .collect()
}

/// Run the gate: invoke, persist cache artifacts, then classify.
pub fn run_gate(ctx: &SessionContext, settings: &GateSettings) -> CompileRun {
    let exec = execute_command(&settings.command, &ctx.project_root, settings.timeout);
    persist(ctx, &settings.command, &exec.output);

    let errors = match exec.status {
        RunStatus::Completed => error_lines(&exec.output, &settings.error_signature),
        _ => Vec::new(),
    };
    let error_count = errors.len();
    CompileRun {
        command: settings.command.clone(),
        raw_output: exec.output,
        status: exec.status,
        notice: exec.notice,
        error_count,
        threshold: settings.threshold,
        band: classify(error_count, settings.threshold),
        errors,
        cache_file: ctx.last_errors().to_string_lossy().to_string(),
    }
}

/// Overwrite `last-errors.txt` and `tsc-commands.txt`. Failures are logged.
fn persist(ctx: &SessionContext, command: &str, raw_output: &str) {
    let write = || -> std::io::Result<()> {
        fs::create_dir_all(ctx.cache_dir())?;
        fs::write(ctx.last_errors(), raw_output)?;
        fs::write(ctx.commands_file(), format!("{}\n", command))?;
        Ok(())
    };
    if let Err(e) = write() {
        tracing::warn!(
            "failed to write gate cache under {}: {}",
            ctx.cache_dir().to_string_lossy(),
            e
        );
    }
}

/// Outcome of one compiler invocation.
struct Execution {
    status: RunStatus,
    /// Combined stdout then stderr, lossily decoded. On timeout this is
    /// whatever was captured before the kill, followed by a notice line.
    output: String,
    notice: Option<String>,
}

/// Run `command` through `sh -c` in its own process group.
///
/// Both pipes are drained on background threads so a chatty compiler never
/// blocks on a full pipe. The exit status is not consulted: only the output
/// decides the band. Past `timeout` the whole group is killed, so wrappers
/// like `npx` do not leave the real compiler running.
fn execute_command(command: &str, cwd: &Path, timeout: Duration) -> Execution {
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("failed to spawn '{}': {}", command, e);
            return Execution {
                status: RunStatus::SpawnFailed,
                output: String::new(),
                notice: Some(format!("could not run `{}`: {}", command, e)),
            };
        }
    };

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let timed_out = loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!("'{}' exited with {}", command, status);
                break false;
            }
            Ok(None) if Instant::now() >= deadline => break true,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::debug!("wait failed for '{}': {}", command, e);
                break false;
            }
        }
    };
    if timed_out {
        kill_group(child.id());
        let _ = child.wait();
    }

    // Pipes reach EOF once every process in the group is gone.
    let mut output = combine(&collect(stdout), &collect(stderr));
    if !timed_out {
        return Execution {
            status: RunStatus::Completed,
            output,
            notice: None,
        };
    }
    let notice = format!("timed out after {:?}", timeout);
    tracing::warn!("'{}' {}", command, notice);
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&format!("[hookguard] {}\n", notice));
    Execution {
        status: RunStatus::TimedOut,
        output,
        notice: Some(notice),
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(25);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = pipe {
            if let Err(e) = r.read_to_end(&mut buf) {
                tracing::debug!("compiler pipe closed early: {}", e);
            }
        }
        buf
    })
}

/// Join a drain thread and decode what it read. Invalid UTF-8 is replaced,
/// never dropped, so diagnostics around a stray byte still count.
fn collect(handle: JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        _ if stdout.ends_with('\n') => format!("{stdout}{stderr}"),
        _ => format!("{stdout}\n{stderr}"),
    }
}

/// SIGKILL every process in the group led by `pgid`.
fn kill_group(pgid: u32) {
    let status = Command::new("kill")
        .args(["-KILL", "--", &format!("-{}", pgid)])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        tracing::debug!("failed to kill process group {}: {}", pgid, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(command: &str) -> GateSettings {
        GateSettings {
            command: command.to_string(),
            ..GateSettings::default()
        }
    }

    #[test]
    fn test_classify_bands() {
        assert_eq!(classify(0, 3), Band::Pass);
        assert_eq!(classify(1, 3), Band::Warn);
        assert_eq!(classify(3, 3), Band::Warn);
        assert_eq!(classify(4, 3), Band::Fail);
        assert_eq!(classify(1, 0), Band::Fail);
        assert_eq!(Band::Warn.exit_code(), 0);
        assert_eq!(Band::Fail.exit_code(), 1);
    }

    #[test]
    fn test_error_lines_match_signature_only() {
        let out = "src/a.ts(1,1): error TS2304: x\nsrc/b.ts(2,2): warning: y\nsrc/c.ts(3,3): error TS1005: z\n";
        let lines = error_lines(out, "error TS");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("TS1005"));
        assert!(error_lines("", "error TS").is_empty());
    }

    #[test]
    fn test_pass_still_writes_cache_artifacts() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", dir.path(), ".claude/tsc-cache");
        let run = run_gate(&ctx, &settings("echo all good"));
        assert_eq!(run.band, Band::Pass);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(fs::read_to_string(ctx.last_errors()).unwrap(), "all good\n");
        assert_eq!(
            fs::read_to_string(ctx.commands_file()).unwrap(),
            "echo all good\n"
        );
    }

    #[test]
    fn test_nonzero_exit_and_stderr_are_counted() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", dir.path(), "cache");
        let cmd = "printf 'a.ts: error TS1: x\\n'; printf 'b.ts: error TS2: y\\n' >&2; exit 2";
        let run = run_gate(&ctx, &settings(cmd));
        assert_eq!(run.error_count, 2);
        assert_eq!(run.band, Band::Warn);
        assert_eq!(run.excerpt().len(), 2);
    }

    #[test]
    fn test_fail_excerpt_is_capped() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", dir.path(), "cache");
        let cmd = "for i in $(seq 1 20); do echo \"f$i.ts: error TS$i: bad\"; done";
        let run = run_gate(&ctx, &settings(cmd));
        assert_eq!(run.error_count, 20);
        assert_eq!(run.band, Band::Fail);
        assert_eq!(run.excerpt().len(), FAIL_EXCERPT);
        assert_eq!(run.band.exit_code(), 1);
    }

    #[test]
    fn test_timeout_is_neutral_and_keeps_partial_output() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", dir.path(), "cache");
        let s = GateSettings {
            command: "echo 'x: error TS1: y'; sleep 5".into(),
            timeout: Duration::from_millis(300),
            ..GateSettings::default()
        };
        let run = run_gate(&ctx, &s);
        assert_eq!(run.status, RunStatus::TimedOut);
        assert_eq!(run.band, Band::Pass);
        assert_eq!(run.notice.as_deref(), Some("timed out after 300ms"));
        let saved = fs::read_to_string(ctx.last_errors()).unwrap();
        assert!(saved.starts_with("x: error TS1: y\n"));
        assert!(saved.contains("timed out"));
    }

    #[test]
    fn test_timeout_kills_background_children() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", dir.path(), "cache");
        // The backgrounded sleep holds the pipes open; only a group kill
        // lets the gate return before it finishes.
        let s = GateSettings {
            command: "(sleep 20; echo late) & echo early; wait".into(),
            timeout: Duration::from_millis(300),
            ..GateSettings::default()
        };
        let started = Instant::now();
        let run = run_gate(&ctx, &s);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(run.status, RunStatus::TimedOut);
        assert!(run.raw_output.contains("early"));
        assert!(!run.raw_output.contains("late"));
    }

    #[test]
    fn test_invalid_utf8_does_not_hide_errors() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", dir.path(), "cache");
        let cmd = "for i in 1 2 3 4 5; do echo \"f$i.ts(1,1): error TS1: bad\"; done; printf 'caf\\351\\n'";
        let run = run_gate(&ctx, &settings(cmd));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.error_count, 5);
        assert_eq!(run.band, Band::Fail);
        let saved = fs::read_to_string(ctx.last_errors()).unwrap();
        assert_eq!(saved.lines().filter(|l| l.contains("error TS")).count(), 5);
        assert!(saved.contains("caf\u{FFFD}"));
    }

    #[test]
    fn test_missing_shell_command_is_completed_not_spawn_failure() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", dir.path(), "cache");
        let run = run_gate(&ctx, &settings("definitely-not-a-compiler-xyz"));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.band, Band::Pass);
    }

    #[test]
    fn test_spawn_failure_is_neutral() {
        let dir = tempdir().unwrap();
        let ctx = SessionContext::new("s", &dir.path().join("missing"), "cache");
        let run = run_gate(&ctx, &settings("echo hi"));
        assert_eq!(run.status, RunStatus::SpawnFailed);
        assert_eq!(run.band, Band::Pass);
        assert!(run.notice.is_some());
    }
}
