//! Configuration for Crewlog.
//!
//! ## config.kdl - User preferences
//!
//! Located at `~/.config/crewlog/config.kdl` (override with `CREW_CONFIG`).
//!
//! Contains:
//! - `data-dir` - Where the database lives
//! - `codex-home` - Codex home; rollouts are read from `<codex-home>/sessions`
//! - `gemini-sessions` - Root of captured gemini stream-json transcripts
//! - `output-format` - "json" or "human"
//! - `log-level` - `tracing` filter directive for stderr diagnostics
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CODEX_HOME_ENV, CONFIG_PATH_ENV, ConfigOverrides, CrewConfig, DATA_DIR_ENV,
    GEMINI_SESSIONS_ENV, LOG_ENV, Resolved, ValueSource, resolve_config, resolve_config_with,
};
pub use schema::{ConfigFile, OutputFormat};
