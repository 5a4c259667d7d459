//! Session-scoped cache layout shared by the tracker, scanner, and gate.
//!
//! All artifacts live under `<project>/<cache-root>/<session-id>/`:
//! - `edited-files.log`: append-only edit records
//! - `last-errors.txt`: raw compiler output from the latest gate run
//! - `tsc-commands.txt`: the command the gate invoked

use std::path::{Path, PathBuf};

pub const DEFAULT_SESSION_ID: &str = "default";
pub const DEFAULT_CACHE_ROOT: &str = ".claude/tsc-cache";

pub const EDIT_LOG: &str = "edited-files.log";
pub const LAST_ERRORS: &str = "last-errors.txt";
pub const COMMANDS_FILE: &str = "tsc-commands.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Correlates independently invoked hook processes around one session.
pub struct SessionContext {
    pub session_id: String,
    pub project_root: PathBuf,
    pub cache_root: PathBuf,
}

impl SessionContext {
    pub fn new(session_id: &str, project_root: &Path, cache_root: &str) -> Self {
        SessionContext {
            session_id: sanitize_session_id(session_id),
            project_root: project_root.to_path_buf(),
            cache_root: PathBuf::from(cache_root),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.project_root
            .join(&self.cache_root)
            .join(&self.session_id)
    }

    pub fn edit_log(&self) -> PathBuf {
        self.cache_dir().join(EDIT_LOG)
    }

    pub fn last_errors(&self) -> PathBuf {
        self.cache_dir().join(LAST_ERRORS)
    }

    pub fn commands_file(&self) -> PathBuf {
        self.cache_dir().join(COMMANDS_FILE)
    }

    /// Join relative paths to the project root; absolute paths pass through.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }
}

/// Session ids become a directory name: blank ids fall back to `default`
/// and path separators are replaced.
fn sanitize_session_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return DEFAULT_SESSION_ID.to_string();
    }
    trimmed.replace(['/', '\\'], "_")
}
