//! Path classification into scanner categories.
//!
//! Globs are matched against the `/`-separated path relative to the project
//! root. First match wins: skip, then server-function, then frontend.
//! Anything else, including paths outside the project, is `other`.

use crate::error::HookError;
use crate::models::rules::RuleSet;
use crate::models::{CategoryKind, FileCategory};
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path};

const MATCH_OPTS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

pub struct Classifier {
    skip: Vec<Pattern>,
    server_functions: Vec<Pattern>,
    frontend: Vec<Pattern>,
}

impl Classifier {
    pub fn new(rules: &RuleSet) -> Result<Self, HookError> {
        Ok(Classifier {
            skip: compile_globs(&rules.skip)?,
            server_functions: compile_globs(&rules.server_functions)?,
            frontend: compile_globs(&rules.frontend)?,
        })
    }

    /// Classify an absolute path against `root`.
    pub fn classify(&self, root: &Path, abs: &Path) -> FileCategory {
        let relative_path = relative_to(root, abs);
        let kind = match relative_path.as_deref() {
            None => CategoryKind::Other,
            Some(rel) => self.kind_of(rel),
        };
        FileCategory {
            kind,
            relative_path: relative_path.unwrap_or_else(|| abs.to_string_lossy().to_string()),
        }
    }

    fn kind_of(&self, rel: &str) -> CategoryKind {
        let hit = |pats: &[Pattern]| pats.iter().any(|p| p.matches_with(rel, MATCH_OPTS));
        if hit(self.skip.as_slice()) {
            CategoryKind::Skip
        } else if hit(self.server_functions.as_slice()) {
            CategoryKind::ServerFunction
        } else if hit(self.frontend.as_slice()) {
            CategoryKind::Frontend
        } else {
            CategoryKind::Other
        }
    }
}

fn compile_globs(globs: &[String]) -> Result<Vec<Pattern>, HookError> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|source| HookError::InvalidGlob {
                pattern: g.clone(),
                source,
            })
        })
        .collect()
}

/// Project-relative path with `/` separators, or `None` when `abs` lies
/// outside `root`.
fn relative_to(root: &Path, abs: &Path) -> Option<String> {
    let rel = pathdiff::diff_paths(abs, root)?;
    let mut parts: Vec<String> = Vec::new();
    for c in rel.components() {
        match c {
            Component::Normal(s) => parts.push(s.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
