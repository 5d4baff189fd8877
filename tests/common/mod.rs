//! Common test utilities for crewlog integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/crewlog/` directory or read their real
//! config and codex sessions.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates two temporary directories:
/// - `repo_dir`: Acts as the repository the agents work in
/// - `data_dir`: Holds the database, codex home and gemini captures
///
/// The `crew()` method returns a `Command` that sets every path-bearing
/// variable per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the crew binary scoped to this environment.
    pub fn crew(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_crew"));
        cmd.current_dir(self.repo_dir.path());
        cmd.env("CREW_DATA_DIR", self.data_dir.path());
        cmd.env("CREW_CONFIG", self.data_dir.path().join("config.kdl"));
        cmd.env("CODEX_HOME", self.codex_home());
        cmd.env("CREW_GEMINI_SESSIONS", self.gemini_sessions());
        cmd.env("CREW_REPO", self.repo_dir.path());
        cmd.env_remove("CREW_BRANCH");
        cmd.env_remove("CREW_LOG");
        cmd
    }

    /// Get the path to the repo directory.
    pub fn repo_path(&self) -> &Path {
        self.repo_dir.path()
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn codex_home(&self) -> PathBuf {
        self.data_dir.path().join("codex")
    }

    pub fn gemini_sessions(&self) -> PathBuf {
        self.data_dir.path().join("gemini")
    }

    /// Today's codex partition, created on demand.
    pub fn codex_today_dir(&self) -> PathBuf {
        let today = chrono::Local::now().format("%Y/%m/%d").to_string();
        let dir = self.codex_home().join("sessions").join(today);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Run a command expected to succeed and parse its JSON stdout.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.crew().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Append raw text to a transcript file, creating it if needed.
pub fn append(path: &Path, content: &str) {
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
}
