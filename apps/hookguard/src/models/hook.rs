//! Host payload received on standard input by every hook.
//!
//! All fields are optional; unknown fields are ignored so that newer host
//! versions never break parsing.

use serde::Deserialize;
use std::io::{IsTerminal, Read};

#[derive(Debug, Default, Deserialize, Clone)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<ToolInput>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub notebook_path: Option<String>,
}

impl HookInput {
    /// Parse a payload; blank or invalid JSON yields `None`.
    pub fn parse(raw: &str) -> Option<HookInput> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str(raw) {
            Ok(hi) => Some(hi),
            Err(e) => {
                tracing::debug!("ignoring unparseable hook payload: {}", e);
                None
            }
        }
    }

    /// Read the payload from stdin unless stdin is an interactive terminal.
    pub fn from_stdin() -> Option<HookInput> {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            return None;
        }
        let mut buf = String::new();
        if let Err(e) = stdin.lock().read_to_string(&mut buf) {
            tracing::debug!("failed to read hook payload: {}", e);
            return None;
        }
        Self::parse(&buf)
    }

    /// Target path of a file-modifying tool call.
    pub fn edited_path(&self) -> Option<&str> {
        let ti = self.tool_input.as_ref()?;
        ti.file_path
            .as_deref()
            .or(ti.notebook_path.as_deref())
            .filter(|p| !p.trim().is_empty())
    }
}
