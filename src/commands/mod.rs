//! Command implementations for the `crew` CLI.
//!
//! Each command takes an open [`Storage`] plus whatever context it needs
//! and returns a result type implementing [`Output`]. Commands are grouped
//! by entity:
//! - task commands - scoped CRUD and cascading delete
//! - agent commands - registration, listing, and transcript access
//! - config commands - inspecting resolved configuration

use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::config::CrewConfig;
use crate::models::{Agent, AgentKind, Scope, Task, TaskStatus, TaskUpdate};
use crate::storage::{Storage, current_branch, find_git_root, generate_id};
use crate::transcript::{self, AgentTranscript, EntryKind};
use crate::{Error, Result};

/// How many freshly generated IDs to try before giving up on a collision.
pub const ID_RETRY_BUDGET: usize = 5;

/// Branch assumed when none can be detected.
pub const DEFAULT_BRANCH: &str = "main";

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

/// Work out the scope for this invocation.
///
/// An explicit repo path is used literally (it must exist). Otherwise the
/// git root above `cwd` is used, falling back to `cwd` itself. The branch
/// comes from the explicit value, then `.git/HEAD`, then [`DEFAULT_BRANCH`].
pub fn detect_scope(
    explicit_repo: Option<&Path>,
    explicit_branch: Option<&str>,
    cwd: &Path,
) -> Result<Scope> {
    let repo = match explicit_repo {
        Some(path) if !path.exists() => {
            return Err(Error::NotFound(format!(
                "Specified repo path does not exist: {}",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => find_git_root(cwd).unwrap_or_else(|| cwd.to_path_buf()),
    };

    let branch = explicit_branch
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .or_else(|| current_branch(&repo))
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    Ok(Scope::new(repo.to_string_lossy(), branch))
}

/// Run `insert` with freshly generated IDs until one does not collide.
///
/// Only `Conflict` triggers another attempt; any other error is returned
/// immediately.
pub fn with_generated_id<T, F>(prefix: &str, seed: &str, mut insert: F) -> Result<T>
where
    F: FnMut(&str) -> Result<T>,
{
    for attempt in 0..ID_RETRY_BUDGET {
        let id = generate_id(prefix, &format!("{}:{}", seed, attempt));
        match insert(&id) {
            Err(Error::Conflict(msg)) => {
                debug!(id = %id, attempt, "generated id collided: {}", msg);
            }
            result => return result,
        }
    }
    Err(Error::Conflict(format!(
        "Could not allocate a unique {} id after {} attempts",
        prefix, ID_RETRY_BUDGET
    )))
}

/// Insert `template` under a generated `t-xxxx` id.
pub fn create_task_with_generated_id(storage: &mut Storage, template: &Task) -> Result<Task> {
    let seed = format!("{}:{}", template.scope, template.title);
    with_generated_id("t", &seed, |id| {
        let task = Task {
            id: id.to_string(),
            ..template.clone()
        };
        storage.create_task(&task)?;
        Ok(task)
    })
}

// === Task Commands ===

#[derive(Serialize)]
pub struct TaskCreated {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Output for TaskCreated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.parent_id {
            Some(parent) => format!("Created task {} \"{}\" under {}", self.id, self.title, parent),
            None => format!("Created task {} \"{}\"", self.id, self.title),
        }
    }
}

/// Create a task in `scope`.
pub fn task_create(
    storage: &mut Storage,
    scope: &Scope,
    title: String,
    parent: Option<String>,
    notes: Option<String>,
    status: Option<String>,
) -> Result<TaskCreated> {
    let mut template = Task::new("", title, scope.clone());
    template.parent_id = parent;
    template.notes = notes;
    if let Some(status) = status {
        template.status = status.parse()?;
    }

    let task = create_task_with_generated_id(storage, &template)?;
    Ok(TaskCreated {
        id: task.id,
        title: task.title,
        parent_id: task.parent_id,
    })
}

/// A task together with its live child count.
#[derive(Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub child_count: usize,
}

impl TaskDetail {
    fn summary_line(&self) -> String {
        let mut line = format!("{} [{}] {}", self.task.id, self.task.status, self.task.title);
        if self.child_count > 0 {
            line.push_str(&format!(" ({} children)", self.child_count));
        }
        if self.task.is_deleted() {
            line.push_str(" (deleted)");
        }
        line
    }
}

impl Output for TaskDetail {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let task = &self.task;
        let mut lines = vec![
            format!("{}: {}", task.id, task.title),
            format!("  Status:   {}", task.status),
            format!("  Scope:    {}", task.scope),
        ];
        if let Some(parent) = &task.parent_id {
            lines.push(format!("  Parent:   {}", parent));
        }
        lines.push(format!("  Children: {}", self.child_count));
        if let Some(notes) = &task.notes {
            lines.push(format!("  Notes:    {}", notes));
        }
        lines.push(format!(
            "  Created:  {}",
            task.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        lines.push(format!(
            "  Updated:  {}",
            task.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(deleted) = task.deleted_at {
            lines.push(format!(
                "  Deleted:  {}",
                deleted.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        lines.join("\n")
    }
}

fn with_child_count(storage: &Storage, task: Task) -> Result<TaskDetail> {
    let child_count = storage.count_children(&task.id)?;
    Ok(TaskDetail { task, child_count })
}

/// Show a task by ID, including soft-deleted ones.
pub fn task_show(storage: &Storage, id: &str) -> Result<TaskDetail> {
    let task = storage.get_task(id)?;
    with_child_count(storage, task)
}

#[derive(Serialize)]
pub struct TaskList {
    pub tasks: Vec<TaskDetail>,
    pub count: usize,
}

impl Output for TaskList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let mut lines: Vec<String> = self.tasks.iter().map(TaskDetail::summary_line).collect();
        lines.push(format!("{} task(s)", self.count));
        lines.join("\n")
    }
}

fn task_list_of(storage: &Storage, tasks: Vec<Task>) -> Result<TaskList> {
    let tasks = tasks
        .into_iter()
        .map(|task| with_child_count(storage, task))
        .collect::<Result<Vec<_>>>()?;
    Ok(TaskList {
        count: tasks.len(),
        tasks,
    })
}

/// Top-level tasks in scope, newest first.
pub fn task_list(storage: &Storage, scope: &Scope) -> Result<TaskList> {
    task_list_of(storage, storage.list_root_tasks(scope)?)
}

/// Direct children of a task, oldest first.
pub fn task_children(storage: &Storage, id: &str) -> Result<TaskList> {
    let parent = storage.get_task(id)?;
    if parent.is_deleted() {
        return Err(Error::NotFound(format!("Task not found or deleted: {}", id)));
    }
    task_list_of(storage, storage.list_child_tasks(id)?)
}

#[derive(Serialize)]
pub struct TaskUpdated {
    pub id: String,
    pub updated_fields: Vec<&'static str>,
    pub status: TaskStatus,
}

impl Output for TaskUpdated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Updated task {}: {} (status: {})",
            self.id,
            self.updated_fields.join(", "),
            self.status
        )
    }
}

/// Apply a partial update. At least one field must be supplied.
pub fn task_update(
    storage: &mut Storage,
    id: &str,
    title: Option<String>,
    status: Option<String>,
    notes: Option<String>,
) -> Result<TaskUpdated> {
    let update = TaskUpdate {
        title,
        status: status.as_deref().map(str::parse).transpose()?,
        notes,
    };
    if update.is_empty() {
        return Err(Error::Validation(
            "Nothing to update: pass --title, --status or --notes".to_string(),
        ));
    }

    let mut updated_fields = Vec::new();
    if update.title.is_some() {
        updated_fields.push("title");
    }
    if update.status.is_some() {
        updated_fields.push("status");
    }
    if update.notes.is_some() {
        updated_fields.push("notes");
    }

    let task = storage.update_task(id, &update)?;
    Ok(TaskUpdated {
        id: task.id,
        updated_fields,
        status: task.status,
    })
}

/// Mark a task closed.
pub fn task_close(storage: &mut Storage, id: &str) -> Result<TaskUpdated> {
    task_update(storage, id, None, Some(TaskStatus::Closed.to_string()), None)
}

#[derive(Serialize)]
pub struct TaskDeleted {
    pub id: String,
    pub deleted: Vec<String>,
    pub count: usize,
}

impl Output for TaskDeleted {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.count {
            0 | 1 => format!("Deleted task {}", self.id),
            n => format!(
                "Deleted task {} and {} descendant(s): {}",
                self.id,
                n - 1,
                self.deleted[1..].join(", ")
            ),
        }
    }
}

/// Soft-delete a task and its whole subtree.
pub fn task_delete(storage: &mut Storage, id: &str) -> Result<TaskDeleted> {
    let deleted = storage.delete_task(id)?;
    Ok(TaskDeleted {
        id: id.to_string(),
        count: deleted.len(),
        deleted,
    })
}

// === Agent Commands ===

#[derive(Serialize)]
pub struct AgentRegistered {
    pub name: String,
    pub external_id: String,
    pub kind: AgentKind,
}

impl Output for AgentRegistered {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Registered {} agent {} ({})",
            self.kind, self.name, self.external_id
        )
    }
}

/// Register an agent spawned in `scope`. A name is generated when none is given.
pub fn agent_register(
    storage: &mut Storage,
    scope: &Scope,
    external_id: String,
    name: Option<String>,
    kind: Option<String>,
    pid: Option<u32>,
) -> Result<AgentRegistered> {
    let kind: AgentKind = kind.as_deref().unwrap_or_default().parse()?;
    let mut template = Agent::new("", external_id, scope.clone()).with_kind(kind);
    template.pid = pid;

    let agent = match name {
        Some(name) => {
            let agent = Agent {
                name,
                ..template
            };
            storage.create_agent(&agent)?;
            agent
        }
        None => {
            let seed = template.external_id.clone();
            with_generated_id("agent", &seed, |name| {
                let agent = Agent {
                    name: name.to_string(),
                    ..template.clone()
                };
                storage.create_agent(&agent)?;
                Ok(agent)
            })?
        }
    };

    Ok(AgentRegistered {
        name: agent.name,
        external_id: agent.external_id,
        kind: agent.kind,
    })
}

fn agent_line(agent: &Agent) -> String {
    let mut line = format!(
        "{} [{}] {} cursor={}",
        agent.name, agent.kind, agent.external_id, agent.cursor
    );
    if let Some(pid) = agent.pid {
        line.push_str(&format!(" pid={}", pid));
    }
    line
}

#[derive(Serialize)]
pub struct AgentList {
    pub agents: Vec<Agent>,
    pub count: usize,
}

impl Output for AgentList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No agents registered.".to_string();
        }
        let mut lines: Vec<String> = self.agents.iter().map(agent_line).collect();
        lines.push(format!("{} agent(s)", self.count));
        lines.join("\n")
    }
}

/// Agents in scope, or every agent when `all` is set.
pub fn agent_list(storage: &Storage, scope: &Scope, all: bool) -> Result<AgentList> {
    let agents = if all {
        storage.list_agents()?
    } else {
        storage.list_agents_by_scope(&scope.repo_path, Some(&scope.branch))?
    };
    Ok(AgentList {
        count: agents.len(),
        agents,
    })
}

#[derive(Serialize)]
pub struct AgentDetail {
    #[serde(flatten)]
    pub agent: Agent,
}

impl Output for AgentDetail {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let agent = &self.agent;
        let session_file = if agent.has_session_file() {
            agent.session_file.as_str()
        } else {
            "(not yet discovered)"
        };
        let mut lines = vec![
            format!("{} [{}]", agent.name, agent.kind),
            format!("  External ID:  {}", agent.external_id),
            format!("  Scope:        {}", agent.scope),
            format!("  Session file: {}", session_file),
            format!("  Cursor:       {}", agent.cursor),
        ];
        if let Some(pid) = agent.pid {
            lines.push(format!("  PID:          {}", pid));
        }
        lines.push(format!(
            "  Spawned:      {}",
            agent.spawned_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        lines.join("\n")
    }
}

pub fn agent_show(storage: &Storage, name: &str) -> Result<AgentDetail> {
    Ok(AgentDetail {
        agent: storage.get_agent(name)?,
    })
}

impl Output for AgentTranscript {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return format!("No new entries for {}.", self.agent);
        }
        self.entries
            .iter()
            .map(|entry| match entry.kind {
                EntryKind::User => format!("> {}", entry.content),
                EntryKind::Message => entry.content.clone(),
                kind => format!("[{}] {}", kind, entry.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Entries since the agent's cursor; advances the cursor.
pub fn agent_peek(storage: &mut Storage, config: &CrewConfig, name: &str) -> Result<AgentTranscript> {
    transcript::peek(storage, config, name)
}

/// The agent's full transcript; leaves the cursor alone.
pub fn agent_logs(storage: &mut Storage, config: &CrewConfig, name: &str) -> Result<AgentTranscript> {
    transcript::logs(storage, config, name)
}

// === Config Commands ===

#[derive(Serialize)]
pub struct ConfigShow {
    #[serde(flatten)]
    pub config: CrewConfig,
}

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let c = &self.config;
        let config_path = c
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string());
        [
            format!("config file:     {}", config_path),
            format!(
                "data-dir:        {} ({})",
                c.data_dir.value.display(),
                c.data_dir.source
            ),
            format!(
                "codex-home:      {} ({})",
                c.codex_home.value.display(),
                c.codex_home.source
            ),
            format!(
                "gemini-sessions: {} ({})",
                c.gemini_sessions.value.display(),
                c.gemini_sessions.source
            ),
            format!(
                "output-format:   {} ({})",
                c.output_format.value, c.output_format.source
            ),
            format!("log-level:       {} ({})", c.log_level.value, c.log_level.source),
        ]
        .join("\n")
    }
}

pub fn config_show(config: &CrewConfig) -> ConfigShow {
    ConfigShow {
        config: config.clone(),
    }
}
