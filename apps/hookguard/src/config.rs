//! Configuration discovery and effective settings resolution.
//!
//! Hookguard reads `hookguard.toml|yaml|yml` from the project root (or closest
//! ancestor when no root was given) and merges it with CLI flags, environment
//! variables, and the host payload to produce an `Effective` config.
//! Defaults:
//! - `cache_root`: `.claude/tsc-cache`
//! - `session_id`: `default`
//! - `output`: `human`
//! - `gate.command`: `npx tsc --noEmit`, `gate.threshold`: 3
//! - `context.limit`: 200000, `context.threshold_percent`: 75
//!
//! Overrides precedence: CLI/env > config file > defaults.

use crate::error::HookError;
use crate::models::hook::HookInput;
use crate::models::rules::{Rule, RuleSet};
use crate::session::{SessionContext, DEFAULT_CACHE_ROOT, DEFAULT_SESSION_ID};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILES: [&str; 3] = ["hookguard.toml", "hookguard.yaml", "hookguard.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `hookguard.toml|yaml`.
pub struct HookguardConfig {
    pub cache_root: Option<String>,
    pub output: Option<String>,
    #[serde(default)]
    pub track: Option<TrackCfg>,
    #[serde(default)]
    pub scan: Option<ScanCfg>,
    #[serde(default)]
    pub gate: Option<GateCfg>,
    #[serde(default)]
    pub context: Option<ContextCfg>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Edit tracker section under `[track]`.
pub struct TrackCfg {
    pub tools: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Scanner section under `[scan]`. Rule tables replace the built-ins.
pub struct ScanCfg {
    pub skip: Option<Vec<String>>,
    pub frontend: Option<Vec<String>>,
    pub server_functions: Option<Vec<String>>,
    pub entry_marker: Option<String>,
    pub try_markers: Option<Vec<String>>,
    pub cleanup_call: Option<String>,
    pub forbidden: Option<Vec<Rule>>,
    pub required: Option<Vec<Rule>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Compiler gate section under `[gate]`.
pub struct GateCfg {
    pub command: Option<String>,
    pub error_signature: Option<String>,
    pub threshold: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Context guardian section under `[context]`.
pub struct ContextCfg {
    pub limit: Option<u64>,
    pub threshold_percent: Option<u64>,
}

#[derive(Debug, Default, Clone)]
/// Values supplied on the command line or through the environment.
pub struct Overrides {
    pub project_root: Option<PathBuf>,
    pub session_id: Option<String>,
    pub cache_root: Option<String>,
    pub output: Option<String>,
    pub command: Option<String>,
    /// Raw flag/env text; parsed leniently so a typo never changes the exit code.
    pub threshold: Option<String>,
    pub timeout_secs: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GateSettings {
    pub command: String,
    pub error_signature: String,
    pub threshold: usize,
    pub timeout: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        GateSettings {
            command: "npx tsc --noEmit".to_string(),
            error_signature: "error TS".to_string(),
            threshold: 3,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContextSettings {
    pub limit: u64,
    pub threshold_percent: u64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        ContextSettings {
            limit: 200_000,
            threshold_percent: 75,
        }
    }
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub session: SessionContext,
    pub output: String,
    pub track_tools: Vec<String>,
    pub rules: RuleSet,
    pub gate: GateSettings,
    pub context: ContextSettings,
}

pub fn default_track_tools() -> Vec<String> {
    ["Edit", "MultiEdit", "Write", "NotebookEdit"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Walk upward from `start` to detect the project root.
///
/// Stops when a `hookguard.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_FILES.iter().any(|f| cur.join(f).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Parse a config file, choosing the format by extension.
pub fn read_config(path: &Path) -> Result<HookguardConfig, HookError> {
    let s = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if is_toml {
        Ok(toml::from_str(&s)?)
    } else {
        Ok(serde_yaml::from_str(&s)?)
    }
}

/// Load `HookguardConfig` from `hookguard.toml` or `hookguard.yaml|yml` if present.
/// An unreadable or invalid file is logged and treated as absent.
pub fn load_config(root: &Path) -> Option<HookguardConfig> {
    let path = CONFIG_FILES
        .iter()
        .map(|f| root.join(f))
        .find(|p| p.exists())?;
    match read_config(&path) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!("ignoring {}: {}", path.to_string_lossy(), e);
            None
        }
    }
}

/// Resolve `Effective` by merging overrides, the host payload, the
/// discovered config, and defaults.
pub fn resolve_effective(ov: &Overrides, payload: Option<&HookInput>) -> Effective {
    let explicit_root = ov
        .project_root
        .clone()
        .filter(|p| !p.as_os_str().is_empty());
    let project_root = match explicit_root {
        Some(p) => make_absolute(p),
        None => {
            let start = payload
                .and_then(|p| p.cwd.as_deref())
                .filter(|c| !c.trim().is_empty())
                .map(PathBuf::from)
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));
            detect_repo_root(&make_absolute(start))
        }
    };
    let cfg = load_config(&project_root).unwrap_or_default();

    let session_id = ov
        .session_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| payload.and_then(|p| p.session_id.clone()))
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
    let cache_root = ov
        .cache_root
        .clone()
        .or(cfg.cache_root)
        .unwrap_or_else(|| DEFAULT_CACHE_ROOT.to_string());
    let output = ov
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());

    let track_tools = cfg
        .track
        .and_then(|t| t.tools)
        .unwrap_or_else(default_track_tools);

    let rules = merge_scan(cfg.scan.unwrap_or_default());

    let gate_cfg = cfg.gate.unwrap_or_default();
    let gate_defaults = GateSettings::default();
    let gate = GateSettings {
        command: ov
            .command
            .clone()
            .or(gate_cfg.command)
            .unwrap_or(gate_defaults.command),
        error_signature: gate_cfg
            .error_signature
            .filter(|s| !s.is_empty())
            .unwrap_or(gate_defaults.error_signature),
        threshold: parse_knob("threshold", ov.threshold.as_deref())
            .or(gate_cfg.threshold)
            .unwrap_or(gate_defaults.threshold),
        timeout: parse_knob::<u64>("timeout_secs", ov.timeout_secs.as_deref())
            .or(gate_cfg.timeout_secs)
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(gate_defaults.timeout),
    };

    let ctx_cfg = cfg.context.unwrap_or_default();
    let ctx_defaults = ContextSettings::default();
    let context = ContextSettings {
        limit: ctx_cfg
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(ctx_defaults.limit),
        threshold_percent: ctx_cfg
            .threshold_percent
            .unwrap_or(ctx_defaults.threshold_percent),
    };

    Effective {
        session: SessionContext::new(&session_id, &project_root, &cache_root),
        output,
        track_tools,
        rules,
        gate,
        context,
    }
}

/// Anchor a relative root at the current dir. Host payloads carry absolute
/// file paths, which only classify against an absolute root.
fn make_absolute(p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        return p;
    }
    match std::path::absolute(&p) {
        Ok(abs) => abs,
        Err(e) => {
            tracing::warn!("cannot resolve project root {}: {}", p.to_string_lossy(), e);
            p
        }
    }
}

/// Parse a numeric override. Malformed values are logged and ignored.
fn parse_knob<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring invalid {} '{}'; using the configured default", name, raw);
            None
        }
    }
}

fn merge_scan(sc: ScanCfg) -> RuleSet {
    let d = RuleSet::default();
    RuleSet {
        skip: sc.skip.unwrap_or(d.skip),
        frontend: sc.frontend.unwrap_or(d.frontend),
        server_functions: sc.server_functions.unwrap_or(d.server_functions),
        forbidden: sc.forbidden.unwrap_or(d.forbidden),
        required: sc.required.unwrap_or(d.required),
        entry_marker: sc.entry_marker.unwrap_or(d.entry_marker),
        try_markers: sc.try_markers.unwrap_or(d.try_markers),
        cleanup_call: sc.cleanup_call.unwrap_or(d.cleanup_call),
    }
}
