//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`CREW_DATA_DIR`, `CODEX_HOME`, `CREW_GEMINI_SESSIONS`, `CREW_LOG`)
//! 3. config.kdl (`~/.config/crewlog/config.kdl`, or `CREW_CONFIG`)
//! 4. Built-in defaults
//!
//! Resolution takes the environment as a lookup function so callers (and
//! tests) decide where variables come from.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::schema::{ConfigFile, OutputFormat};
use crate::storage::DB_FILE_NAME;
use crate::{Error, Result};

pub const CONFIG_PATH_ENV: &str = "CREW_CONFIG";
pub const DATA_DIR_ENV: &str = "CREW_DATA_DIR";
pub const CODEX_HOME_ENV: &str = "CODEX_HOME";
pub const GEMINI_SESSIONS_ENV: &str = "CREW_GEMINI_SESSIONS";
pub const LOG_ENV: &str = "CREW_LOG";

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ValueSource {
    EnvVar(String),
    ConfigFile,
    CliFlag,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl From<ValueSource> for String {
    fn from(source: ValueSource) -> Self {
        source.to_string()
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Runtime overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
}

/// Fully resolved configuration, threaded explicitly into storage and
/// session discovery.
#[derive(Debug, Clone, Serialize)]
pub struct CrewConfig {
    /// config.kdl location that was consulted (it may not exist)
    pub config_path: Option<PathBuf>,
    pub data_dir: Resolved<PathBuf>,
    pub codex_home: Resolved<PathBuf>,
    pub gemini_sessions: Resolved<PathBuf>,
    pub output_format: Resolved<OutputFormat>,
    pub log_level: Resolved<String>,
}

impl CrewConfig {
    /// A config with every root placed under `base`. No files are read.
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            config_path: None,
            data_dir: Resolved::new(base.to_path_buf(), ValueSource::Default),
            codex_home: Resolved::new(base.join("codex"), ValueSource::Default),
            gemini_sessions: Resolved::new(base.join("gemini-sessions"), ValueSource::Default),
            output_format: Resolved::new(OutputFormat::default(), ValueSource::Default),
            log_level: Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir.value
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(DB_FILE_NAME)
    }

    /// Root of codex's date-partitioned rollout files.
    pub fn codex_sessions_root(&self) -> PathBuf {
        self.codex_home.value.join("sessions")
    }

    /// Root of the date-partitioned gemini stream captures.
    pub fn gemini_sessions_root(&self) -> &Path {
        &self.gemini_sessions.value
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn log_level(&self) -> &str {
        &self.log_level.value
    }
}

/// Resolve configuration from the process environment.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<CrewConfig> {
    resolve_config_with(overrides, |name| std::env::var(name).ok())
}

/// Resolve configuration using `env` for variable lookups.
pub fn resolve_config_with<F>(overrides: &ConfigOverrides, env: F) -> Result<CrewConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    let config_path = env(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|d| d.join("crewlog").join("config.kdl")));
    let file = match &config_path {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let data_dir = match (&overrides.data_dir, env(DATA_DIR_ENV), &file.data_dir) {
        (Some(dir), _, _) => Resolved::new(dir.clone(), ValueSource::CliFlag),
        (None, Some(dir), _) => Resolved::new(
            PathBuf::from(dir),
            ValueSource::EnvVar(DATA_DIR_ENV.to_string()),
        ),
        (None, None, Some(dir)) => Resolved::new(dir.clone(), ValueSource::ConfigFile),
        (None, None, None) => {
            let base = dirs::data_dir().ok_or_else(|| {
                Error::Config("Could not determine data directory".to_string())
            })?;
            Resolved::new(base.join("crewlog"), ValueSource::Default)
        }
    };

    let codex_home = match (env(CODEX_HOME_ENV), &file.codex_home) {
        (Some(dir), _) => Resolved::new(
            PathBuf::from(dir),
            ValueSource::EnvVar(CODEX_HOME_ENV.to_string()),
        ),
        (None, Some(dir)) => Resolved::new(dir.clone(), ValueSource::ConfigFile),
        (None, None) => {
            let home = dirs::home_dir().ok_or_else(|| {
                Error::Config("Could not determine home directory".to_string())
            })?;
            Resolved::new(home.join(".codex"), ValueSource::Default)
        }
    };

    let gemini_sessions = match (env(GEMINI_SESSIONS_ENV), &file.gemini_sessions) {
        (Some(dir), _) => Resolved::new(
            PathBuf::from(dir),
            ValueSource::EnvVar(GEMINI_SESSIONS_ENV.to_string()),
        ),
        (None, Some(dir)) => Resolved::new(dir.clone(), ValueSource::ConfigFile),
        (None, None) => Resolved::new(data_dir.value.join("gemini-sessions"), ValueSource::Default),
    };

    let output_format = match (overrides.output_format, file.output_format) {
        (Some(format), _) => Resolved::new(format, ValueSource::CliFlag),
        (None, Some(format)) => Resolved::new(format, ValueSource::ConfigFile),
        (None, None) => Resolved::new(OutputFormat::default(), ValueSource::Default),
    };

    let log_level = match (env(LOG_ENV), &file.log_level) {
        (Some(level), _) => Resolved::new(level, ValueSource::EnvVar(LOG_ENV.to_string())),
        (None, Some(level)) => Resolved::new(level.clone(), ValueSource::ConfigFile),
        (None, None) => Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default),
    };

    Ok(CrewConfig {
        config_path,
        data_dir,
        codex_home,
        gemini_sessions,
        output_format,
        log_level,
    })
}

/// Missing file means "no settings"; unreadable or invalid content is an error.
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    match fs::read_to_string(path) {
        Ok(content) => ConfigFile::parse(&content, &path.display().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(Error::Config(format!("{}: {}", path.display(), e))),
    }
}
