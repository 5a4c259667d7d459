//! Context guardian: warns when the session transcript nears the model's
//! context limit.
//!
//! The transcript is JSON Lines; the last entry carrying `message.usage`
//! describes the current context size. Reaching the threshold exits with
//! code 2 so the host feeds the warning back to the agent.

use crate::config::ContextSettings;
use crate::error::HookError;
use serde::Deserialize;
use serde_json::Value as Json;
use std::fs;
use std::path::Path;

/// Exit code that makes the host surface stderr to the agent.
pub const BLOCKING_EXIT: i32 = 2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextCheck {
    pub tokens: u64,
    pub percent: u64,
    pub limit: u64,
    pub threshold_percent: u64,
    pub over: bool,
}

/// Last `message.usage` entry in a JSONL transcript; `None` if there is none.
pub fn last_usage(transcript: &str) -> Option<Usage> {
    let mut last = None;
    for line in transcript.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<Json>(line) else {
            continue;
        };
        if let Some(usage) = entry.get("message").and_then(|m| m.get("usage")) {
            if let Ok(u) = serde_json::from_value::<Usage>(usage.clone()) {
                last = Some(u);
            }
        }
    }
    last
}

pub fn evaluate(usage: &Usage, settings: &ContextSettings) -> ContextCheck {
    let tokens = usage.context_tokens();
    let limit = settings.limit.max(1);
    let threshold_tokens = limit * settings.threshold_percent / 100;
    ContextCheck {
        tokens,
        percent: tokens * 100 / limit,
        limit,
        threshold_percent: settings.threshold_percent,
        over: tokens >= threshold_tokens,
    }
}

/// Read the transcript and evaluate it. `Ok(None)` means nothing to report.
pub fn check_transcript(
    path: &Path,
    settings: &ContextSettings,
) -> Result<Option<ContextCheck>, HookError> {
    let data = fs::read_to_string(path)?;
    Ok(last_usage(&data).map(|u| evaluate(&u, settings)))
}

/// Thousands-separated integer, e.g. `150,000`.
fn group_digits(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Warning text shown to the agent once the threshold is crossed.
pub fn format_warning(check: &ContextCheck) -> String {
    format!(
        "CONTEXT: {}% ({}/{} tokens)\n\n\
         The {}% threshold has been exceeded. You MUST ask the user:\n\
         \"Context usage is above {}%. How do you want to continue?\"\n\n\
         Options to offer:\n\
         1. \"Finish the task and commit\" - complete the current task, commit, and end the session\n\
         2. \"Save working notes\" - record the current state of the work so a fresh session can resume it\n\
         3. \"Continue with sub-agents\" - delegate every search, analysis, and implementation step to sub-agents to preserve the main context",
        check.percent,
        group_digits(check.tokens),
        group_digits(check.limit),
        check.threshold_percent,
        check.percent,
    )
}
