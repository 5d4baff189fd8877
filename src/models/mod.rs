//! Data models for Crewlog entities.
//!
//! This module defines the persisted records:
//! - `Task` - Hierarchical work items scoped to a repository checkout
//! - `Agent` - Externally spawned coding agents and their read cursor
//!
//! Transcript entries are derived, never stored; see [`crate::transcript`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The (repository, branch) pair that partitions tasks and agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub repo_path: String,
    pub branch: String,
}

impl Scope {
    pub fn new(repo_path: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repo_path, self.branch)
    }
}

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(TaskStatus::Open),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "closed" => Ok(TaskStatus::Closed),
            _ => Err(Error::Validation(format!(
                "Invalid status: {} (expected open, in_progress, closed)",
                s
            ))),
        }
    }
}

/// A work item tracked by Crewlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (e.g., "t-a1b2")
    pub id: String,

    /// Parent task ID; parent must share this task's scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub title: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(flatten)]
    pub scope: Scope,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker. Once set it is never cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new open task with the given ID and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>, scope: Scope) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            parent_id: None,
            title: title.into(),
            status: TaskStatus::default(),
            notes: None,
            scope,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Partial update for a task. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub notes: Option<String>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.status.is_none() && self.notes.is_none()
    }
}

/// Which external tool an agent runs. Selects the transcript format and
/// where its session files live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[default]
    Codex,
    Gemini,
}

impl AgentKind {
    pub const ALL: [AgentKind; 2] = [AgentKind::Codex, AgentKind::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Codex => "codex",
            AgentKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // Rows written before the kind column existed carry an empty value.
            "" | "codex" => Ok(AgentKind::Codex),
            "gemini" => Ok(AgentKind::Gemini),
            _ => Err(Error::Validation(format!(
                "Unknown agent kind: {} (expected codex or gemini)",
                s
            ))),
        }
    }
}

/// An externally spawned coding agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique, human-facing identity
    pub name: String,

    /// Thread/session id reported by the spawned process
    pub external_id: String,

    /// Resolved transcript path; empty until first successful discovery
    #[serde(default)]
    pub session_file: String,

    /// Number of transcript lines already delivered by `peek`
    #[serde(default)]
    pub cursor: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    #[serde(flatten)]
    pub scope: Scope,

    #[serde(default)]
    pub kind: AgentKind,

    pub spawned_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, external_id: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            external_id: external_id.into(),
            session_file: String::new(),
            cursor: 0,
            pid: None,
            scope,
            kind: AgentKind::default(),
            spawned_at: Utc::now(),
        }
    }

    pub fn with_kind(mut self, kind: AgentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn has_session_file(&self) -> bool {
        !self.session_file.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!("open".parse::<TaskStatus>().unwrap(), TaskStatus::Open);
        assert_eq!(
            "In-Progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!("closed".parse::<TaskStatus>().unwrap(), TaskStatus::Closed);
        assert!(matches!(
            "done".parse::<TaskStatus>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_agent_kind_defaults_to_codex() {
        assert_eq!(AgentKind::default(), AgentKind::Codex);
        assert_eq!("".parse::<AgentKind>().unwrap(), AgentKind::Codex);
        assert_eq!("GEMINI".parse::<AgentKind>().unwrap(), AgentKind::Gemini);
        assert!("claude".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_task_serializes_flat_scope() {
        let task = Task::new("t-0001", "Root", Scope::new("/repo", "main"));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["repo_path"], "/repo");
        assert_eq!(json["branch"], "main");
        assert_eq!(json["status"], "open");
        assert!(json.get("deleted_at").is_none());
    }
}
