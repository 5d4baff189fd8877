//! Task operations: scoped CRUD and cascading soft delete.

use super::{Storage, format_ts, parse_ts, validate_identifier};
use crate::models::{Scope, Task, TaskStatus, TaskUpdate};
use crate::{Error, Result, StorageContext, is_constraint_violation};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use std::collections::{HashSet, VecDeque};
use tracing::info;

const TASK_COLUMNS: &str =
    "id, parent_id, title, status, notes, created_at, updated_at, deleted_at, repo_path, branch";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    let deleted_at: Option<String> = row.get(7)?;
    let parent_id: Option<String> = row.get(1)?;

    Ok(Task {
        id: row.get(0)?,
        // Legacy rows may carry '' instead of NULL for "no parent".
        parent_id: parent_id.filter(|p| !p.is_empty()),
        title: row.get(2)?,
        status,
        notes: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
        updated_at: parse_ts(6, &updated_at)?,
        deleted_at: deleted_at.as_deref().map(|d| parse_ts(7, d)).transpose()?,
        scope: Scope {
            repo_path: row.get(8)?,
            branch: row.get(9)?,
        },
    })
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("Task title cannot be empty".to_string()));
    }
    Ok(())
}

impl Storage {
    // === Task Operations ===

    /// Create a new task.
    ///
    /// The parent, if any, must exist, be live, and share the task's scope.
    /// Parent check and insert run in one transaction so a concurrent
    /// delete of the parent cannot slip in between.
    pub fn create_task(&mut self, task: &Task) -> Result<()> {
        validate_identifier("task id", &task.id)?;
        validate_title(&task.title)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .op("begin create task")?;

        if let Some(parent_id) = &task.parent_id {
            let parent: Option<(String, String, Option<String>)> = tx
                .query_row(
                    "SELECT repo_path, branch, deleted_at FROM tasks WHERE id = ?1",
                    [parent_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .op("look up parent task")?;

            match parent {
                None => {
                    return Err(Error::Validation(format!(
                        "Parent task not found: {}",
                        parent_id
                    )));
                }
                Some((_, _, Some(_))) => {
                    return Err(Error::Validation(format!(
                        "Parent task is deleted: {}",
                        parent_id
                    )));
                }
                Some((repo_path, branch, None))
                    if repo_path != task.scope.repo_path || branch != task.scope.branch =>
                {
                    return Err(Error::Validation(format!(
                        "Parent task {} belongs to {}@{}, not {}",
                        parent_id, repo_path, branch, task.scope
                    )));
                }
                Some(_) => {}
            }
        }

        tx.execute(
            "INSERT INTO tasks (id, parent_id, title, status, notes, created_at, updated_at,
                                deleted_at, repo_path, branch)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9)",
            params![
                task.id,
                task.parent_id,
                task.title,
                task.status.as_str(),
                task.notes,
                format_ts(&task.created_at),
                format_ts(&task.updated_at),
                task.scope.repo_path,
                task.scope.branch,
            ],
        )
        .map_err(|source| {
            if is_constraint_violation(&source) {
                Error::Conflict(format!("Task already exists: {}", task.id))
            } else {
                Error::Storage {
                    op: "insert task",
                    source,
                }
            }
        })?;

        tx.commit().op("commit create task")?;
        Ok(())
    }

    /// Get a task by ID, including soft-deleted tasks.
    pub fn get_task(&self, id: &str) -> Result<Task> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                [id],
                task_from_row,
            )
            .optional()
            .op("get task")?
            .ok_or_else(|| Error::NotFound(format!("Task not found: {}", id)))
    }

    /// Apply a partial update and return the updated task.
    ///
    /// One statement coalesces each field with its stored value, so fields
    /// left as `None` are untouched. Deleted tasks cannot be updated.
    pub fn update_task(&mut self, id: &str, update: &TaskUpdate) -> Result<Task> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }

        let changed = self
            .conn
            .execute(
                "UPDATE tasks
                 SET title = COALESCE(?2, title),
                     status = COALESCE(?3, status),
                     notes = COALESCE(?4, notes),
                     updated_at = ?5
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![
                    id,
                    update.title,
                    update.status.map(|s| s.as_str()),
                    update.notes,
                    format_ts(&Utc::now()),
                ],
            )
            .op("update task")?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Task not found or deleted: {}", id)));
        }
        self.get_task(id)
    }

    /// Live top-level tasks in a scope, newest first.
    pub fn list_root_tasks(&self, scope: &Scope) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM tasks
                 WHERE (parent_id IS NULL OR parent_id = '')
                   AND deleted_at IS NULL
                   AND repo_path = ?1 AND branch = ?2
                 ORDER BY created_at DESC, rowid DESC",
                TASK_COLUMNS
            ))
            .op("list root tasks")?;
        let tasks = stmt
            .query_map([&scope.repo_path, &scope.branch], task_from_row)
            .op("list root tasks")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("list root tasks")?;
        Ok(tasks)
    }

    /// Live direct children of a task, oldest first (execution order).
    pub fn list_child_tasks(&self, parent_id: &str) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM tasks
                 WHERE parent_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at ASC, rowid ASC",
                TASK_COLUMNS
            ))
            .op("list child tasks")?;
        let tasks = stmt
            .query_map([parent_id], task_from_row)
            .op("list child tasks")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("list child tasks")?;
        Ok(tasks)
    }

    /// Number of live direct children.
    pub fn count_children(&self, parent_id: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM tasks WHERE parent_id = ?1 AND deleted_at IS NULL",
                [parent_id],
                |row| row.get(0),
            )
            .op("count child tasks")?;
        Ok(count as usize)
    }

    /// Soft-delete a task and its whole subtree.
    ///
    /// Walks parent→children edges breadth-first, then stamps `deleted_at`
    /// on every node, all inside one IMMEDIATE transaction: either the
    /// whole subtree is deleted or nothing is. Returns the IDs this call
    /// marked deleted, root first; descendants deleted earlier are walked
    /// through but left untouched and unreported.
    pub fn delete_task(&mut self, id: &str) -> Result<Vec<String>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .op("begin delete task")?;

        let state: Option<Option<String>> = tx
            .query_row("SELECT deleted_at FROM tasks WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
            .op("look up task")?;
        if !matches!(state, Some(None)) {
            return Err(Error::NotFound(format!("Task not found or deleted: {}", id)));
        }

        let mut subtree = vec![id.to_string()];
        {
            let mut children = tx
                .prepare("SELECT id FROM tasks WHERE parent_id = ?1")
                .op("collect subtree")?;
            let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
            let mut queue: VecDeque<String> = VecDeque::from([id.to_string()]);

            while let Some(current) = queue.pop_front() {
                let ids = children
                    .query_map([&current], |row| row.get::<_, String>(0))
                    .op("collect subtree")?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .op("collect subtree")?;
                for child in ids {
                    if seen.insert(child.clone()) {
                        subtree.push(child.clone());
                        queue.push_back(child);
                    }
                }
            }
        }

        let now = format_ts(&Utc::now());
        let mut deleted = Vec::with_capacity(subtree.len());
        {
            let mut mark = tx
                .prepare(
                    "UPDATE tasks SET deleted_at = ?2, updated_at = ?2
                     WHERE id = ?1 AND deleted_at IS NULL",
                )
                .op("mark task deleted")?;
            for task_id in subtree {
                if mark.execute(params![task_id, now]).op("mark task deleted")? == 1 {
                    deleted.push(task_id);
                }
            }
        }

        tx.commit().op("commit delete task")?;
        info!(task = id, cascaded = deleted.len(), "soft-deleted task subtree");
        Ok(deleted)
    }
}
