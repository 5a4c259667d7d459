//! Output rendering for the scan and gate commands.
//!
//! Supports `human` (default) and `json` outputs. Human output is colored
//! only on a terminal with `NO_COLOR` unset. The scanner prints nothing at
//! all when there are no warnings.

use crate::gate::{Band, CompileRun, RunStatus};
use crate::models::{CategoryKind, ScanReport, WarningKind};
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;
use std::io::IsTerminal;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Print the scan report in the requested format. Empty reports print nothing.
pub fn print_scan(report: &ScanReport, output: &str) {
    if report.is_empty() {
        return;
    }
    match output {
        "json" => match serde_json::to_string_pretty(&compose_scan_json(report)) {
            Ok(s) => println!("{}", s),
            Err(e) => tracing::debug!("failed to encode scan report: {}", e),
        },
        _ => print!("{}", render_scan_human(report, use_colors(output))),
    }
}

/// Render the human scan report (pure) for testing purposes.
pub fn render_scan_human(report: &ScanReport, color: bool) -> String {
    if report.is_empty() {
        return String::new();
    }
    let paint = |s: &str, f: fn(&str) -> String| if color { f(s) } else { s.to_string() };
    let mut out = String::new();
    out.push_str(&paint(RULE, |s| s.yellow().to_string()));
    out.push('\n');
    out.push_str(&paint("📋 CODE COMPLIANCE CHECK", |s| s.bold().to_string()));
    out.push('\n');
    out.push_str(&paint(RULE, |s| s.yellow().to_string()));
    out.push('\n');

    for kind in [CategoryKind::Frontend, CategoryKind::ServerFunction] {
        let files: Vec<_> = report.by_category(kind).collect();
        if files.is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(&paint(kind.heading(), |s| s.cyan().bold().to_string()));
        out.push('\n');
        for fa in files {
            out.push_str(&format!("  {}\n", paint(fa.file.as_str(), |s| s.bold().to_string())));
            for w in &fa.warnings {
                match (w.kind, w.line) {
                    (WarningKind::Forbidden, Some(line)) => {
                        let label = format!("Line {}:", line);
                        out.push_str(&format!(
                            "    {} {}\n",
                            paint(label.as_str(), |s| s.red().to_string()),
                            w.pattern
                        ));
                    }
                    _ => {
                        out.push_str(&format!(
                            "    {}\n",
                            paint(w.pattern.as_str(), |s| s.red().to_string())
                        ));
                    }
                }
                out.push_str(&format!("      → {}\n", w.suggestion));
            }
        }
    }

    out.push('\n');
    let summary = format!(
        "{} warning(s) in {} file(s)",
        report.warning_count(),
        report.files.len()
    );
    out.push_str(&paint(summary.as_str(), |s| s.bold().to_string()));
    out.push('\n');
    out.push_str(&paint(RULE, |s| s.yellow().to_string()));
    out.push('\n');
    out
}

/// Compose scan JSON object (pure) for testing purposes.
pub fn compose_scan_json(report: &ScanReport) -> JsonVal {
    json!({
        "files": report.files,
        "summary": {
            "files": report.files.len(),
            "warnings": report.warning_count(),
        }
    })
}

/// Print the gate result in the requested format.
pub fn print_gate(run: &CompileRun, output: &str) {
    match output {
        "json" => match serde_json::to_string_pretty(&compose_gate_json(run)) {
            Ok(s) => println!("{}", s),
            Err(e) => tracing::warn!("failed to encode gate result: {}", e),
        },
        _ => print!("{}", render_gate_human(run, use_colors(output))),
    }
}

/// Render the human gate banner (pure) for testing purposes.
pub fn render_gate_human(run: &CompileRun, color: bool) -> String {
    let mut out = String::new();
    if run.status != RunStatus::Completed {
        let reason = match (&run.notice, run.status) {
            (Some(n), _) => n.clone(),
            (None, RunStatus::TimedOut) => "timed out".to_string(),
            (None, _) => format!("could not run `{}`", run.command),
        };
        let msg = format!("⏭️  Compile check skipped: {}", reason);
        out.push_str(&if color {
            msg.bright_black().to_string()
        } else {
            msg
        });
        out.push('\n');
        return out;
    }

    let banner = match run.band {
        Band::Pass => "✅ Compile check passed: 0 errors".to_string(),
        Band::Warn => format!(
            "⚠️  Compile check: {} error(s) (threshold {})",
            run.error_count, run.threshold
        ),
        Band::Fail => format!(
            "❌ Compile check failed: {} errors exceed the threshold of {}",
            run.error_count, run.threshold
        ),
    };
    let banner = if color {
        match run.band {
            Band::Pass => banner.green().bold().to_string(),
            Band::Warn => banner.yellow().bold().to_string(),
            Band::Fail => banner.red().bold().to_string(),
        }
    } else {
        banner
    };
    out.push_str(&banner);
    out.push('\n');
    if run.band == Band::Pass {
        return out;
    }

    let shown = run.excerpt();
    for line in shown {
        out.push_str(&format!("  {}\n", line));
    }
    if run.error_count > shown.len() {
        out.push_str(&format!("  ... and {} more\n", run.error_count - shown.len()));
    }
    match run.band {
        Band::Warn => out.push_str(&format!(
            "→ Fix these before they pile up; run `{}` for details.\n",
            run.command
        )),
        _ => {
            out.push_str("→ Fix the compile errors before continuing.\n");
            out.push_str(&format!("Full output: {}\n", run.cache_file));
        }
    }
    out
}

/// Compose gate JSON object (pure) for testing purposes.
pub fn compose_gate_json(run: &CompileRun) -> JsonVal {
    json!({
        "band": run.band,
        "status": run.status,
        "notice": run.notice,
        "error_count": run.error_count,
        "threshold": run.threshold,
        "errors": run.excerpt(),
        "cache_file": run.cache_file,
    })
}
