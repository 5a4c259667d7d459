//! End-of-turn compliance scanner.
//!
//! Reads the session edit log, keeps the latest record per path, classifies
//! each file, and runs the category's rule table against the file's current
//! content. The scanner is advisory: callers turn every error into a silent
//! success, so nothing here decides an exit code.

use crate::classify::Classifier;
use crate::error::HookError;
use crate::models::rules::{compile_all, CompiledRule, RuleSet};
use crate::models::{CategoryKind, EditRecord, FileAnalysis, ScanReport, Warning, WarningKind};
use crate::session::SessionContext;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Compiled scanner state for one run.
pub struct Scanner {
    classifier: Classifier,
    forbidden: Vec<CompiledRule>,
    required: Vec<CompiledRule>,
    entry_marker: String,
    try_markers: Vec<String>,
    cleanup_call: String,
    catch_block: Regex,
    return_stmt: Regex,
}

impl Scanner {
    pub fn new(rules: &RuleSet) -> Result<Self, HookError> {
        Ok(Scanner {
            classifier: Classifier::new(rules)?,
            forbidden: compile_all(&rules.forbidden),
            required: compile_all(&rules.required),
            entry_marker: rules.entry_marker.clone(),
            try_markers: rules.try_markers.clone(),
            cleanup_call: rules.cleanup_call.clone(),
            // From `catch (...) {` to the first line that opens with `}`.
            catch_block: Regex::new(r"(?m)catch\s*(?:\([^)]*\))?\s*\{[\s\S]*?^[ \t]*\}")
                .map_err(|source| HookError::InvalidRule {
                    pattern: "catch-block".into(),
                    source,
                })?,
            return_stmt: Regex::new(r"\breturn\b").map_err(|source| HookError::InvalidRule {
                pattern: "return".into(),
                source,
            })?,
        })
    }

    /// Scan every file touched during the session.
    pub fn scan_session(&self, ctx: &SessionContext) -> Result<ScanReport, HookError> {
        let records = read_edit_log(&ctx.edit_log())?;
        if records.is_empty() {
            tracing::debug!("no edit records for session {}", ctx.session_id);
            return Ok(ScanReport::default());
        }
        let mut files = Vec::new();
        for rec in latest_per_path(ctx, records) {
            if let Some(fa) = self.analyze_record(ctx, &rec) {
                files.push(fa);
            }
        }
        // Deterministic ordering: category, then path
        files.sort_by(|a, b| a.category.cmp(&b.category).then(a.file.cmp(&b.file)));
        Ok(ScanReport { files })
    }

    fn analyze_record(&self, ctx: &SessionContext, rec: &EditRecord) -> Option<FileAnalysis> {
        let abs = ctx.resolve(&rec.path);
        let cat = self.classifier.classify(&ctx.project_root, &abs);
        if !cat.kind.is_scanned() {
            return None;
        }
        let content = match fs::read(&abs) {
            // A stray non-UTF-8 byte must not hide the rest of the file
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::debug!("skipping unreadable {}: {}", abs.to_string_lossy(), e);
                }
                return None;
            }
        };
        let warnings = match cat.kind {
            CategoryKind::Frontend => self.scan_frontend(&content),
            CategoryKind::ServerFunction => self.scan_server_function(&content),
            _ => Vec::new(),
        };
        if warnings.is_empty() {
            return None;
        }
        Some(FileAnalysis {
            file: cat.relative_path,
            category: cat.kind,
            warnings,
        })
    }

    /// One `forbidden` warning per match, with its 1-based line.
    pub fn scan_frontend(&self, content: &str) -> Vec<Warning> {
        let lines = LineIndex::new(content);
        let mut out = Vec::new();
        for rule in &self.forbidden {
            for m in rule.regex.find_iter(content) {
                out.push(Warning {
                    kind: WarningKind::Forbidden,
                    pattern: m.as_str().to_string(),
                    suggestion: rule.message.clone(),
                    line: Some(lines.line_of(m.start())),
                });
            }
        }
        out
    }

    /// Required-pattern checks for request-handler entry points.
    pub fn scan_server_function(&self, content: &str) -> Vec<Warning> {
        if self.entry_marker.is_empty() || !content.contains(&self.entry_marker) {
            return Vec::new();
        }
        if !self.try_markers.iter().any(|t| content.contains(t.as_str())) {
            return Vec::new();
        }
        let mut out: Vec<Warning> = self
            .required
            .iter()
            .filter(|rule| !rule.regex.is_match(content))
            .map(|rule| Warning {
                kind: WarningKind::Missing,
                pattern: rule.name.clone(),
                suggestion: rule.message.clone(),
                line: None,
            })
            .collect();
        if !self.cleanup_call.is_empty() {
            for block in self.catch_block.find_iter(content) {
                let text = block.as_str();
                if self.return_stmt.is_match(text) && !text.contains(&self.cleanup_call) {
                    out.push(Warning {
                        kind: WarningKind::Missing,
                        pattern: format!("catch block returns without {}", self.cleanup_call),
                        suggestion: format!(
                            "Call {} in the catch block before returning",
                            self.cleanup_call
                        ),
                        line: None,
                    });
                }
            }
        }
        out
    }
}

/// Read the edit log. A missing log is an empty session, not an error.
pub fn read_edit_log(path: &Path) -> Result<Vec<EditRecord>, HookError> {
    let data = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(data.lines().filter_map(EditRecord::parse).collect())
}

/// Keep the most recent record for each path (later lines win). Relative
/// and absolute spellings of the same file share one entry.
pub fn latest_per_path(ctx: &SessionContext, records: Vec<EditRecord>) -> Vec<EditRecord> {
    let mut latest: BTreeMap<PathBuf, EditRecord> = BTreeMap::new();
    for rec in records {
        latest.insert(ctx.resolve(&rec.path), rec);
    }
    latest.into_values().collect()
}

/// Byte offsets of line starts, for offset to line-number lookups.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scanner() -> Scanner {
        Scanner::new(&RuleSet::default()).unwrap()
    }

    const HANDLER_OK: &str = r#"import { corsHeaders } from "../_shared/cors.ts";

Deno.serve(async (req) => {
  try {
    const body = await req.json();
    return new Response(JSON.stringify(body), { headers: corsHeaders });
  } catch (error) {
    console.error(error);
    return new Response("bad", { status: 500, headers: corsHeaders });
  }
});
"#;

    #[test]
    fn test_line_index() {
        let li = LineIndex::new("a\nbb\n\nc");
        assert_eq!(li.line_of(0), 1);
        assert_eq!(li.line_of(2), 2);
        assert_eq!(li.line_of(5), 3);
        assert_eq!(li.line_of(6), 4);
    }

    #[test]
    fn test_frontend_each_occurrence_is_reported() {
        let src = "console.log(1);\nconst a = 2;\nconsole.log(a);\n\n  console.log(3)\n";
        let ws = scanner().scan_frontend(src);
        assert_eq!(ws.len(), 3);
        let lines: Vec<usize> = ws.iter().map(|w| w.line.unwrap()).collect();
        assert_eq!(lines, vec![1, 3, 5]);
        assert!(ws.iter().all(|w| w.kind == WarningKind::Forbidden));
        assert!(ws.iter().all(|w| w.pattern == "console.log("));
    }

    #[test]
    fn test_frontend_clean_file() {
        let ws = scanner().scan_frontend("export const x: number = 1;\n");
        assert!(ws.is_empty());
    }

    #[test]
    fn test_frontend_reports_matched_text_for_any() {
        let ws = scanner().scan_frontend("let x: any = 1;\n");
        assert_eq!(ws.len(), 1);
        assert_eq!(ws[0].pattern, ": any");
    }

    #[test]
    fn test_server_function_without_entry_marker_is_ignored() {
        let src = "export function helper() {\n  try { x() } catch (e) { return 1\n}\n}\n";
        assert!(scanner().scan_server_function(src).is_empty());
    }

    #[test]
    fn test_server_function_without_try_is_ignored() {
        let src = "Deno.serve(() => new Response('ok'));\n";
        assert!(scanner().scan_server_function(src).is_empty());
    }

    #[test]
    fn test_server_function_compliant() {
        assert!(scanner().scan_server_function(HANDLER_OK).is_empty());
    }

    #[test]
    fn test_server_function_missing_every_required_pattern() {
        let src = "Deno.serve(async () => {\n  try{\n    work();\n  } finally {\n  }\n});\n";
        let s = scanner();
        let ws = s.scan_server_function(src);
        assert_eq!(ws.len(), 3);
        assert!(ws.iter().all(|w| w.kind == WarningKind::Missing && w.line.is_none()));
        let names: Vec<&str> = ws.iter().map(|w| w.pattern.as_str()).collect();
        assert_eq!(names, vec!["corsHeaders", r"console\.error\(", r"status:\s*[45]\d\d"]);
        // Idempotent on unchanged content
        assert_eq!(s.scan_server_function(src), ws);
    }

    #[test]
    fn test_catch_block_returning_without_cleanup() {
        // console.error exists elsewhere, but the second catch block skips it
        let src = r#"Deno.serve(async (req) => {
  try {
    await a();
  } catch (e) {
    console.error(e);
    return new Response("x", { status: 500, headers: corsHeaders });
  }
  try {
    await b();
  } catch (e) {
    return new Response("y", { status: 400, headers: corsHeaders });
  }
});
"#;
        let ws = scanner().scan_server_function(src);
        assert_eq!(ws.len(), 1);
        assert_eq!(ws[0].pattern, "catch block returns without console.error(");
    }

    #[test]
    fn test_catch_block_without_return_is_fine() {
        let src = r#"Deno.serve(async () => {
  try {
    await a();
  } catch {
    failed = true;
  }
  console.error("x"); // status: 500 corsHeaders
});
"#;
        assert!(scanner().scan_server_function(src).is_empty());
    }

    #[test]
    fn test_latest_per_path_keeps_last_record() {
        let recs = vec![
            EditRecord::parse("1\tEdit\tsrc/a.ts").unwrap(),
            EditRecord::parse("2\tWrite\tsrc/b.ts").unwrap(),
            EditRecord::parse("3\tMultiEdit\tsrc/a.ts").unwrap(),
        ];
        let latest = latest_per_path(&session(Path::new("/p")), recs);
        assert_eq!(latest.len(), 2);
        let a = latest.iter().find(|r| r.path == "src/a.ts").unwrap();
        assert_eq!(a.tool, "MultiEdit");
    }

    fn session(root: &Path) -> SessionContext {
        SessionContext::new("s1", root, ".claude/tsc-cache")
    }

    fn write_log(ctx: &SessionContext, lines: &[&str]) {
        fs::create_dir_all(ctx.cache_dir()).unwrap();
        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(ctx.edit_log(), body).unwrap();
    }

    #[test]
    fn test_invalid_utf8_source_is_still_scanned() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let ctx = session(root);
        fs::create_dir_all(root.join("src")).unwrap();
        let mut body = b"const name = 'caf".to_vec();
        body.push(0xE9);
        body.extend_from_slice(b"';\nconsole.log(name);\n");
        fs::write(root.join("src/menu.ts"), body).unwrap();
        write_log(&ctx, &["t\tEdit\tsrc/menu.ts"]);

        let rep = scanner().scan_session(&ctx).unwrap();
        assert_eq!(rep.files.len(), 1);
        assert_eq!(rep.files[0].warnings[0].line, Some(2));
    }

    #[test]
    fn test_missing_log_is_empty_report() {
        let dir = tempdir().unwrap();
        let rep = scanner().scan_session(&session(dir.path())).unwrap();
        assert!(rep.is_empty());
    }

    #[test]
    fn test_session_scan_dedupes_and_skips() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let ctx = session(root);
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/App.tsx"), "console.log('a');\n").unwrap();
        fs::write(root.join("src/App.test.tsx"), "console.log('t');\n").unwrap();
        let abs_line = format!("t3\tMultiEdit\t{}", root.join("src/App.tsx").to_string_lossy());
        write_log(
            &ctx,
            &[
                "t1\tEdit\tsrc/App.tsx",
                "garbage line",
                "t2\tWrite\tsrc/App.test.tsx",
                abs_line.as_str(),
                "t4\tEdit\tsrc/App.tsx",
                "t5\tWrite\tsrc/deleted.tsx",
            ],
        );
        let rep = scanner().scan_session(&ctx).unwrap();
        assert_eq!(rep.files.len(), 1);
        assert_eq!(rep.files[0].file, "src/App.tsx");
        assert_eq!(rep.files[0].category, CategoryKind::Frontend);
        assert_eq!(rep.files[0].warnings.len(), 1);
        assert_eq!(rep.files[0].warnings[0].line, Some(1));
    }
}
