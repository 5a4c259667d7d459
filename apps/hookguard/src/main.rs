//! Hookguard CLI binary entry point.
//! Resolves configuration, delegates to the hook modules, and maps results
//! to exit codes.

use clap::Parser;
use hookguard::cli::{Cli, Commands};
use hookguard::config::{self, Effective};
use hookguard::error::HookError;
use hookguard::models::hook::HookInput;
use hookguard::scan::Scanner;
use hookguard::{context, gate, output, tracker};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr; stdout carries hook output only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HOOKGUARD_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Track {
            session,
            tool,
            path,
        } => {
            let payload = if tool.is_some() && path.is_some() {
                None
            } else {
                HookInput::from_stdin()
            };
            let eff = config::resolve_effective(&session.overrides(), payload.as_ref());
            match tracker::track(
                &eff.session,
                &eff.track_tools,
                payload.as_ref(),
                tool.as_deref(),
                path.as_deref(),
            ) {
                Ok(Some(rec)) => tracing::debug!("tracked {} ({})", rec.path, rec.tool),
                Ok(None) => {}
                Err(e) => tracing::debug!("edit not recorded: {}", e),
            }
        }
        Commands::Scan {
            session,
            output: output_mode,
        } => {
            let payload = HookInput::from_stdin();
            let mut ov = session.overrides();
            ov.output = output_mode;
            let eff = config::resolve_effective(&ov, payload.as_ref());
            if let Err(e) = run_scan_guarded(&eff) {
                tracing::debug!("scan produced no report: {}", e);
            }
        }
        Commands::Gate {
            session,
            output: output_mode,
            command,
            threshold,
            timeout_secs,
        } => {
            let payload = HookInput::from_stdin();
            let mut ov = session.overrides();
            ov.output = output_mode;
            ov.command = command;
            ov.threshold = threshold;
            ov.timeout_secs = timeout_secs;
            let eff = config::resolve_effective(&ov, payload.as_ref());
            let run = gate::run_gate(&eff.session, &eff.gate);
            output::print_gate(&run, &eff.output);
            let code = run.band.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Context { session } => {
            let Some(payload) = HookInput::from_stdin() else {
                return;
            };
            let Some(transcript) = payload.transcript_path.clone() else {
                return;
            };
            let eff = config::resolve_effective(&session.overrides(), Some(&payload));
            match context::check_transcript(Path::new(&transcript), &eff.context) {
                Ok(Some(check)) if check.over => {
                    eprintln!("{}", context::format_warning(&check));
                    std::process::exit(context::BLOCKING_EXIT);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("context check skipped: {}", e),
            }
        }
    }
}

/// Scan and print, converting every failure (panics included) into an
/// error the caller logs. The scan never changes the exit code.
fn run_scan_guarded(eff: &Effective) -> Result<(), HookError> {
    let prev_hook = panic::take_hook();
    panic::set_hook(Box::new(|info| tracing::debug!("scan panicked: {}", info)));
    let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), HookError> {
        let scanner = Scanner::new(&eff.rules)?;
        let report = scanner.scan_session(&eff.session)?;
        output::print_scan(&report, &eff.output);
        Ok(())
    }));
    panic::set_hook(prev_hook);
    match result {
        Ok(r) => r,
        Err(_) => Err(HookError::Panicked("internal error".into())),
    }
}
