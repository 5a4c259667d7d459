//! Hookguard core library.
//!
//! This crate exposes the lifecycle hooks run around an agent's turns:
//! an edit tracker, an advisory compliance scanner, a compiler gate, and a
//! context-usage guardian. The hooks share no memory; they correlate through
//! a session-scoped cache directory on disk.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `session`: Session context and cache file layout.
//! - `tracker`: Append-only edit log writer.
//! - `classify`: Path-to-category classification.
//! - `scan`: Forbidden/required pattern scanning of edited files.
//! - `gate`: Compiler invocation and pass/warn/fail banding.
//! - `context`: Transcript token accounting.
//! - `models`: Data models for records, warnings, rules, and payloads.
//! - `output`: Human/JSON printers for scan and gate.
//! - `error`: Crate error type.
pub mod classify;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod models;
pub mod output;
pub mod scan;
pub mod session;
pub mod tracker;
