//! Crewlog - persistence and transcript ingestion for spawned coding agents.
//!
//! This library provides the core functionality for the `crew` CLI tool:
//! scoped, hierarchical tasks with cascading soft delete, a registry of
//! externally spawned agents, and incremental reading of each agent's
//! JSON-Lines transcript.

pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod sessions;
pub mod storage;
pub mod transcript;


/// Library-level error type for Crewlog operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error during {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for Crewlog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach the failing operation's name to a raw SQLite error.
pub(crate) trait StorageContext<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|source| Error::Storage { op, source })
    }
}

/// True when a SQLite error is a UNIQUE/PRIMARY KEY constraint violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
