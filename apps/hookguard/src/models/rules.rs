//! Rule tables for the compliance scanner.
//!
//! Rules are plain data: an ordered list of `{ pattern, message }` records.
//! Built-in tables are used unless `[[scan.forbidden]]` or
//! `[[scan.required]]` are present in the config file.

use crate::error::HookError;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// A single pattern rule with its remediation message.
pub struct Rule {
    pub pattern: String,
    pub message: String,
}

impl Rule {
    pub fn new(pattern: &str, message: &str) -> Self {
        Rule {
            pattern: pattern.to_string(),
            message: message.to_string(),
        }
    }

    pub fn compile(&self) -> Result<CompiledRule, HookError> {
        let regex = Regex::new(&self.pattern).map_err(|source| HookError::InvalidRule {
            pattern: self.pattern.clone(),
            source,
        })?;
        Ok(CompiledRule {
            name: self.pattern.clone(),
            regex,
            message: self.message.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub regex: Regex,
    pub message: String,
}

/// Compile a table, dropping (and logging) patterns that do not compile.
pub fn compile_all(rules: &[Rule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .filter_map(|r| match r.compile() {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!("skipping rule: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
/// Fully-resolved scanner rule data (classification globs, markers, tables).
pub struct RuleSet {
    pub skip: Vec<String>,
    pub frontend: Vec<String>,
    pub server_functions: Vec<String>,
    pub forbidden: Vec<Rule>,
    pub required: Vec<Rule>,
    pub entry_marker: String,
    pub try_markers: Vec<String>,
    pub cleanup_call: String,
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            skip: default_skip(),
            frontend: default_frontend(),
            server_functions: default_server_functions(),
            forbidden: default_forbidden(),
            required: default_required(),
            entry_marker: "Deno.serve(".to_string(),
            try_markers: vec!["try {".to_string(), "try{".to_string()],
            cleanup_call: "console.error(".to_string(),
        }
    }
}

pub fn default_skip() -> Vec<String> {
    [
        "**/*.test.*",
        "**/*.spec.*",
        "**/__tests__/**",
        "**/*.d.ts",
        "**/*.config.*",
        "**/node_modules/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_frontend() -> Vec<String> {
    ["src/**/*.ts", "src/**/*.tsx", "src/**/*.js", "src/**/*.jsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_server_functions() -> Vec<String> {
    vec!["supabase/functions/**/*.ts".to_string()]
}

pub fn default_forbidden() -> Vec<Rule> {
    vec![
        Rule::new(
            r"console\.log\(",
            "Remove console.log or route it through the project logger",
        ),
        Rule::new(
            r":\s*any\b",
            "Replace `any` with a concrete type or `unknown`",
        ),
        Rule::new(
            r"@ts-ignore",
            "Fix the underlying type error instead of suppressing it",
        ),
        Rule::new(
            r"dangerouslySetInnerHTML",
            "Sanitize the markup or render it as text",
        ),
    ]
}

pub fn default_required() -> Vec<Rule> {
    vec![
        Rule::new("corsHeaders", "Spread corsHeaders into every Response"),
        Rule::new(r"console\.error\(", "Log caught errors with console.error"),
        Rule::new(
            r"status:\s*[45]\d\d",
            "Return an explicit 4xx/5xx status for failures",
        ),
    ]
}
