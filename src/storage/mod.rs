//! Storage layer for Crewlog data.
//!
//! A single SQLite database holds two tables, `tasks` and `agents`, shared
//! by every repository checkout; rows are partitioned by their
//! `(repo_path, branch)` columns. Every CLI invocation opens the store
//! afresh, so [`Storage::open`] also brings older databases up to the
//! current schema.
//!
//! ## Migrations
//!
//! Migrations are strictly additive. Each declared column is checked with
//! `pragma_table_info` and added on its own if missing, so a database left
//! half-migrated (or migrated concurrently by another process) still
//! converges without "column already exists" failures.

mod agents;
mod tasks;

use crate::config::CrewConfig;
use crate::{Error, Result, StorageContext};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name of the database inside the data directory.
pub const DB_FILE_NAME: &str = "crewlog.db";

/// How long a connection waits on another process's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A column that later schema versions added to an existing table.
struct ColumnDef {
    name: &'static str,
    decl: &'static str,
}

/// Columns `tasks` may be missing when opened from an older version.
const TASK_MIGRATIONS: &[ColumnDef] = &[
    ColumnDef { name: "notes", decl: "TEXT" },
    ColumnDef { name: "deleted_at", decl: "TEXT" },
    ColumnDef { name: "repo_path", decl: "TEXT NOT NULL DEFAULT ''" },
    ColumnDef { name: "branch", decl: "TEXT NOT NULL DEFAULT ''" },
];

/// Columns `agents` may be missing when opened from an older version.
const AGENT_MIGRATIONS: &[ColumnDef] = &[
    ColumnDef { name: "session_file", decl: "TEXT NOT NULL DEFAULT ''" },
    ColumnDef { name: "cursor", decl: "INTEGER NOT NULL DEFAULT 0" },
    ColumnDef { name: "pid", decl: "INTEGER" },
    ColumnDef { name: "repo_path", decl: "TEXT NOT NULL DEFAULT ''" },
    ColumnDef { name: "branch", decl: "TEXT NOT NULL DEFAULT ''" },
    ColumnDef { name: "kind", decl: "TEXT NOT NULL DEFAULT 'codex'" },
];

/// Handle to the on-disk store.
pub struct Storage {
    path: PathBuf,
    conn: Connection,
    applied_migrations: Vec<String>,
}

impl Storage {
    /// Open or create the database at `db_path` and bring its schema up to date.
    ///
    /// Any DDL failure is fatal: the error is returned and no handle exists.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path).op("open database")?;
        conn.busy_timeout(BUSY_TIMEOUT).op("set busy timeout")?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .op("enable WAL journal")?;
        debug!(path = %db_path.display(), journal_mode = %mode, "opened database");

        let applied_migrations = Self::init_schema(&conn)?;

        Ok(Self {
            path: db_path.to_path_buf(),
            conn,
            applied_migrations,
        })
    }

    /// Open the database in the configured data directory.
    pub fn open_default(config: &CrewConfig) -> Result<Self> {
        Self::open(&config.db_path())
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Columns added by this open, as `table.column`. Empty when the
    /// database was already current.
    pub fn applied_migrations(&self) -> &[String] {
        &self.applied_migrations
    }

    /// Create tables if absent, migrate, then build indexes.
    fn init_schema(conn: &Connection) -> Result<Vec<String>> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                repo_path TEXT NOT NULL DEFAULT '',
                branch TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS agents (
                name TEXT PRIMARY KEY,
                external_id TEXT NOT NULL,
                session_file TEXT NOT NULL DEFAULT '',
                cursor INTEGER NOT NULL DEFAULT 0,
                pid INTEGER,
                repo_path TEXT NOT NULL DEFAULT '',
                branch TEXT NOT NULL DEFAULT '',
                kind TEXT NOT NULL DEFAULT 'codex',
                spawned_at TEXT NOT NULL
            );
            "#,
        )
        .op("create tables")?;

        let applied = Self::run_migrations(conn)?;

        conn.execute_batch(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tasks_scope ON tasks(repo_path, branch, parent_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
            CREATE INDEX IF NOT EXISTS idx_agents_scope ON agents(repo_path, branch);
            "#,
        )
        .op("create indexes")?;

        Ok(applied)
    }

    /// Add every declared column that is missing, one ALTER at a time.
    fn run_migrations(conn: &Connection) -> Result<Vec<String>> {
        let mut applied = Vec::new();
        for (table, columns) in [("tasks", TASK_MIGRATIONS), ("agents", AGENT_MIGRATIONS)] {
            for column in columns {
                if add_column_if_missing(conn, table, column)? {
                    debug!(table, column = column.name, "added missing column");
                    applied.push(format!("{}.{}", table, column.name));
                }
            }
        }
        Ok(applied)
    }
}

/// Returns true if this call added the column.
fn add_column_if_missing(conn: &Connection, table: &str, column: &ColumnDef) -> Result<bool> {
    // SQLite doesn't support IF NOT EXISTS for ALTER TABLE, so we check the schema first
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column.name],
            |row| row.get(0),
        )
        .op("inspect table columns")?;
    if exists {
        return Ok(false);
    }

    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column.name, column.decl);
    match conn.execute(&sql, []) {
        Ok(_) => Ok(true),
        // Another process added it between our check and the ALTER.
        Err(e) if is_duplicate_column(&e) => Ok(false),
        Err(source) => Err(Error::Storage {
            op: "add column",
            source,
        }),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("duplicate column name")
    )
}

/// Format a timestamp for storage. Fixed-width RFC 3339 in UTC, so text
/// order equals chronological order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp, reporting the column on failure.
pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Generate a short ID for a task or agent.
///
/// Format: `<prefix>-<4 hex chars>`. The keyspace is small on purpose
/// (IDs are typed by humans); callers retry on collision.
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..4])
}

/// Validate an externally supplied identifier (task id, agent name,
/// external thread/session id).
///
/// Identifiers end up in file-name matching during session discovery, so
/// only ASCII alphanumerics, `-`, `_` and `.` are allowed.
pub fn validate_identifier(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{} cannot be empty", what)));
    }
    if value == "." || value == ".." {
        return Err(Error::Validation(format!("Invalid {}: {}", what, value)));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::Validation(format!(
            "Invalid {}: {} (unexpected character {:?})",
            what, value, bad
        )));
    }
    Ok(())
}

/// Find the git repository root by walking up from `start`.
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Read the checked-out branch name from `.git/HEAD`.
///
/// Handles linked worktrees, where `.git` is a file pointing at the real
/// git dir. Returns `None` for a detached HEAD.
pub fn current_branch(repo_root: &Path) -> Option<String> {
    let dot_git = repo_root.join(".git");
    let git_dir = if dot_git.is_file() {
        let content = fs::read_to_string(&dot_git).ok()?;
        let target = content.trim().strip_prefix("gitdir:")?.trim();
        let target = PathBuf::from(target);
        if target.is_absolute() {
            target
        } else {
            repo_root.join(target)
        }
    } else {
        dot_git
    };

    let head = fs::read_to_string(git_dir.join("HEAD")).ok()?;
    head.trim()
        .strip_prefix("ref: refs/heads/")
        .map(str::to_string)
}
