//! CLI argument definitions for Crewlog.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Crewlog - track spawned coding agents and the tasks they work on.
///
/// Register an agent with `crew agent register`, then use `crew agent peek`
/// to read what it has done since you last looked.
#[derive(Parser, Debug)]
#[command(name = "crew")]
#[command(author, version, about = "Track spawned coding agents and their tasks", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if crew was started in <path> instead of the current directory.
    /// The path must exist. Bypasses git root detection - uses the path literally.
    /// Can also be set via CREW_REPO environment variable.
    #[arg(short = 'C', long = "repo", global = true, env = "CREW_REPO")]
    pub repo_path: Option<PathBuf>,

    /// Branch to scope tasks and agents to (default: the checked-out branch)
    #[arg(long, global = true, env = "CREW_BRANCH")]
    pub branch: Option<String>,

    /// Directory holding the database (overrides CREW_DATA_DIR and config.kdl)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Agent registry and transcript commands
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Parent task ID (must be in the same repo and branch)
        #[arg(short, long)]
        parent: Option<String>,

        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Initial status (open, in_progress, closed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show task details, including deleted tasks
    Show {
        /// Task ID (e.g., t-a1b2)
        id: String,
    },

    /// List top-level tasks in the current scope, newest first
    List,

    /// List a task's direct children, oldest first
    Children {
        /// Parent task ID
        id: String,
    },

    /// Update a task (status: open, in_progress, closed)
    Update {
        /// Task ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Close a task
    Close {
        /// Task ID
        id: String,
    },

    /// Delete a task and all of its descendants
    Delete {
        /// Task ID
        id: String,
    },
}

/// Agent subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Register a spawned agent by its thread/session id
    Register {
        /// Thread or session id reported by the agent process
        external_id: String,

        /// Agent name (generated when omitted)
        #[arg(long)]
        name: Option<String>,

        /// Agent kind: codex or gemini
        #[arg(long)]
        kind: Option<String>,

        /// Process ID of the spawned agent
        #[arg(long)]
        pid: Option<u32>,
    },

    /// List agents in the current scope
    List {
        /// Include agents from every repo and branch
        #[arg(long)]
        all: bool,
    },

    /// Show an agent's registry record
    Show {
        /// Agent name
        name: String,
    },

    /// Show transcript entries since the last peek and advance the cursor
    Peek {
        /// Agent name
        name: String,
    },

    /// Show the full transcript without moving the cursor
    Logs {
        /// Agent name
        name: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration values and where each came from
    Show,
}

impl Commands {
    /// Short dotted name for diagnostics (e.g. "task.create").
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Task { command } => match command {
                TaskCommands::Create { .. } => "task.create",
                TaskCommands::Show { .. } => "task.show",
                TaskCommands::List => "task.list",
                TaskCommands::Children { .. } => "task.children",
                TaskCommands::Update { .. } => "task.update",
                TaskCommands::Close { .. } => "task.close",
                TaskCommands::Delete { .. } => "task.delete",
            },
            Commands::Agent { command } => match command {
                AgentCommands::Register { .. } => "agent.register",
                AgentCommands::List { .. } => "agent.list",
                AgentCommands::Show { .. } => "agent.show",
                AgentCommands::Peek { .. } => "agent.peek",
                AgentCommands::Logs { .. } => "agent.logs",
            },
            Commands::Config { command } => match command {
                ConfigCommands::Show => "config.show",
            },
        }
    }
}
