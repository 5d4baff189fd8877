//! Session-file discovery.
//!
//! Both agent kinds keep transcripts in a `YYYY/MM/DD` tree whose file
//! names end with the agent's external id. Discovery looks in today's
//! partition first and only falls back to walking the whole tree on a miss.
//! The result is cached on the agent record, so the walk happens at most
//! once per agent.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::CrewConfig;
use crate::models::{Agent, AgentKind};
use crate::storage::{Storage, validate_identifier};
use crate::{Error, Result};

const ROLLOUT_STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Finds the transcript file for an external thread/session id.
pub trait SessionLocator {
    /// Path of the transcript for `external_id`, or `Error::NotFound`.
    fn find(&self, external_id: &str) -> Result<PathBuf>;
}

/// Locator over a date-partitioned directory tree.
#[derive(Debug, Clone)]
pub struct DatedSessionLocator {
    root: PathBuf,
    prefix: &'static str,
    suffix: &'static str,
    today: NaiveDate,
}

impl DatedSessionLocator {
    pub fn new(root: impl Into<PathBuf>, prefix: &'static str, suffix: &'static str) -> Self {
        Self {
            root: root.into(),
            prefix,
            suffix,
            today: Local::now().date_naive(),
        }
    }

    /// Use a fixed date as "today".
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Partition directory for a date: `<root>/YYYY/MM/DD`.
    pub fn partition(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
    }

    /// `<prefix>[<YYYY-MM-DDThh-mm-ss>-]<external_id><suffix>`. The id must
    /// fill everything after the optional timestamp.
    fn matches(&self, file_name: &str, external_id: &str) -> bool {
        let Some(stem) = file_name
            .strip_prefix(self.prefix)
            .and_then(|rest| rest.strip_suffix(self.suffix))
        else {
            return false;
        };
        match stem.strip_suffix(external_id) {
            Some("") => true,
            Some(head) => head.strip_suffix('-').is_some_and(|stamp| {
                NaiveDateTime::parse_from_str(stamp, ROLLOUT_STAMP_FORMAT).is_ok()
            }),
            None => false,
        }
    }

    /// Keep whichever candidate has the greater file name.
    fn prefer(best: Option<PathBuf>, candidate: PathBuf) -> Option<PathBuf> {
        match best {
            Some(current) if current.file_name() >= candidate.file_name() => Some(current),
            _ => Some(candidate),
        }
    }

    fn scan_dir(&self, dir: &Path, external_id: &str) -> Option<PathBuf> {
        let mut best = None;
        for entry in fs::read_dir(dir).ok()?.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            if self.matches(&name.to_string_lossy(), external_id) {
                best = Self::prefer(best, entry.path());
            }
        }
        best
    }

    fn scan_tree(&self, external_id: &str) -> Option<PathBuf> {
        let mut best = None;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file()
                    && self.matches(&entry.file_name().to_string_lossy(), external_id)
                {
                    best = Self::prefer(best, entry.path());
                }
            }
        }
        best
    }
}

impl SessionLocator for DatedSessionLocator {
    fn find(&self, external_id: &str) -> Result<PathBuf> {
        validate_identifier("external id", external_id)?;

        let today = self.partition(self.today);
        if let Some(path) = self.scan_dir(&today, external_id) {
            debug!(path = %path.display(), "session file found in today's partition");
            return Ok(path);
        }

        debug!(root = %self.root.display(), external_id, "falling back to full session scan");
        self.scan_tree(external_id).ok_or_else(|| {
            Error::NotFound(format!(
                "No session file for {} under {}",
                external_id,
                self.root.display()
            ))
        })
    }
}

/// The locator for an agent kind.
pub fn locator_for(kind: AgentKind, config: &CrewConfig) -> DatedSessionLocator {
    match kind {
        AgentKind::Codex => DatedSessionLocator::new(config.codex_sessions_root(), "rollout-", ".jsonl"),
        AgentKind::Gemini => DatedSessionLocator::new(config.gemini_sessions_root(), "", ".jsonl"),
    }
}

/// Return the agent's transcript path, discovering and caching it on first use.
pub fn resolve_session_file(
    storage: &mut Storage,
    agent: &Agent,
    locator: &dyn SessionLocator,
) -> Result<PathBuf> {
    if agent.has_session_file() {
        return Ok(PathBuf::from(&agent.session_file));
    }

    let path = locator.find(&agent.external_id).map_err(|e| match e {
        Error::NotFound(msg) => Error::NotFound(format!("Agent {}: {}", agent.name, msg)),
        other => other,
    })?;
    storage.update_session_file_path(&agent.name, &path.to_string_lossy())?;
    info!(agent = %agent.name, path = %path.display(), "cached session file");
    Ok(path)
}
