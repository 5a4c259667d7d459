//! Shared data models for edit records, scan warnings, and hook payloads.

pub mod hook;
pub mod rules;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One line of the session edit log: `timestamp\ttool\tpath`.
pub struct EditRecord {
    pub timestamp: String,
    pub tool: String,
    pub path: String,
}

impl EditRecord {
    /// Parse a single log line. Returns `None` for blank lines, a field
    /// count other than three, or an empty path.
    pub fn parse(line: &str) -> Option<EditRecord> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return None;
        }
        let path = fields[2].trim();
        if path.is_empty() {
            return None;
        }
        Some(EditRecord {
            timestamp: fields[0].to_string(),
            tool: fields[1].to_string(),
            path: path.to_string(),
        })
    }

    /// Render the record as a newline-terminated log line.
    pub fn to_line(&self) -> String {
        format!("{}\t{}\t{}\n", self.timestamp, self.tool, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
/// Functional category derived from a file's project-relative path.
pub enum CategoryKind {
    Frontend,
    ServerFunction,
    Other,
    Skip,
}

impl CategoryKind {
    /// Section heading used by the human report.
    pub fn heading(&self) -> &'static str {
        match self {
            CategoryKind::Frontend => "FRONTEND",
            CategoryKind::ServerFunction => "SERVER-FUNCTION",
            CategoryKind::Other => "OTHER",
            CategoryKind::Skip => "SKIP",
        }
    }

    /// Only frontend and server-function files carry rules.
    pub fn is_scanned(&self) -> bool {
        matches!(self, CategoryKind::Frontend | CategoryKind::ServerFunction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCategory {
    pub kind: CategoryKind,
    pub relative_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    Forbidden,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A single rule violation. `line` is only known for forbidden matches.
pub struct Warning {
    pub kind: WarningKind,
    pub pattern: String,
    pub suggestion: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
/// All warnings for one touched file.
pub struct FileAnalysis {
    pub file: String,
    pub category: CategoryKind,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Default, Serialize)]
/// Scanner output. Only files with at least one warning are listed.
pub struct ScanReport {
    pub files: Vec<FileAnalysis>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.files.iter().map(|f| f.warnings.len()).sum()
    }

    /// Files of one category, in report order.
    pub fn by_category(&self, kind: CategoryKind) -> impl Iterator<Item = &FileAnalysis> {
        self.files.iter().filter(move |f| f.category == kind)
    }
}
