//! KDL schema for config.kdl.

use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Error, Result};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Values read from config.kdl. Every field is optional; unset fields fall
/// through to built-in defaults during resolution.
///
/// # KDL Schema
///
/// ```kdl
/// data-dir "/home/me/.local/share/crewlog"
/// codex-home "/home/me/.codex"
/// gemini-sessions "/home/me/.local/share/crewlog/gemini-sessions"
/// output-format "human"  // or "json"
/// log-level "debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub data_dir: Option<PathBuf>,
    pub codex_home: Option<PathBuf>,
    pub gemini_sessions: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
    pub log_level: Option<String>,
}

impl ConfigFile {
    /// Parse config.kdl text. `origin` names the file in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", origin, e)))?;
        Self::from_kdl(&doc, origin)
    }

    /// Read config from a parsed KDL document.
    pub fn from_kdl(doc: &KdlDocument, origin: &str) -> Result<Self> {
        let output_format = match string_value(doc.get("output-format")) {
            Some(raw) => Some(OutputFormat::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "{}: output-format must be \"json\" or \"human\", got {:?}",
                    origin, raw
                ))
            })?),
            None => None,
        };

        Ok(Self {
            data_dir: string_value(doc.get("data-dir")).map(PathBuf::from),
            codex_home: string_value(doc.get("codex-home")).map(PathBuf::from),
            gemini_sessions: string_value(doc.get("gemini-sessions")).map(PathBuf::from),
            output_format,
            log_level: string_value(doc.get("log-level")),
        })
    }
}

/// First argument of a node, if it is a string.
fn string_value(node: Option<&KdlNode>) -> Option<String> {
    node?
        .entries()
        .first()?
        .value()
        .as_string()
        .map(str::to_string)
}
