//! Edit tracker: appends one record per file-modifying tool call.
//!
//! Each call is a single `write_all` of a complete line on a file opened in
//! append mode, so concurrent writers never split each other's lines.

use crate::error::HookError;
use crate::models::hook::HookInput;
use crate::models::EditRecord;
use crate::session::SessionContext;
use chrono::{SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;

/// Build a record for `tool` touching `path`, stamped with the current time.
pub fn new_record(tool: &str, path: &str) -> Result<EditRecord, HookError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(HookError::BadRecord("empty path".into()));
    }
    if path.contains(['\t', '\n', '\r']) || tool.contains(['\t', '\n', '\r']) {
        return Err(HookError::BadRecord(format!(
            "control character in record for {:?}",
            path
        )));
    }
    Ok(EditRecord {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        tool: tool.to_string(),
        path: path.to_string(),
    })
}

/// Append `rec` to the session edit log, creating the cache dir if needed.
pub fn append_record(ctx: &SessionContext, rec: &EditRecord) -> Result<(), HookError> {
    fs::create_dir_all(ctx.cache_dir())?;
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ctx.edit_log())?;
    f.write_all(rec.to_line().as_bytes())?;
    Ok(())
}

/// Pick the tool/path pair to record: explicit values win over the payload.
/// Returns `None` when the call is not a tracked edit.
pub fn select_edit(
    tools: &[String],
    payload: Option<&HookInput>,
    cli_tool: Option<&str>,
    cli_path: Option<&str>,
) -> Option<(String, String)> {
    let tool = cli_tool
        .map(|s| s.to_string())
        .or_else(|| payload.and_then(|p| p.tool_name.clone()))?;
    let path = cli_path
        .map(|s| s.to_string())
        .or_else(|| payload.and_then(|p| p.edited_path().map(|s| s.to_string())))?;
    // Manual invocations with an explicit tool are always recorded
    if cli_tool.is_none() && !tools.iter().any(|t| t == &tool) {
        tracing::debug!("tool {} is not tracked", tool);
        return None;
    }
    Some((tool, path))
}

/// Record one edit. Failures are returned so the caller can log them; the
/// command itself never fails the host turn.
pub fn track(
    ctx: &SessionContext,
    tools: &[String],
    payload: Option<&HookInput>,
    cli_tool: Option<&str>,
    cli_path: Option<&str>,
) -> Result<Option<EditRecord>, HookError> {
    let Some((tool, path)) = select_edit(tools, payload, cli_tool, cli_path) else {
        return Ok(None);
    };
    let rec = new_record(&tool, &path)?;
    append_record(ctx, &rec)?;
    Ok(Some(rec))
}
