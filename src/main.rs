//! Crewlog CLI - track spawned coding agents and the tasks they work on.

use clap::Parser;
use crewlog::cli::{AgentCommands, Cli, Commands, ConfigCommands, TaskCommands};
use crewlog::commands::{self, Output};
use crewlog::config::{ConfigOverrides, CrewConfig, OutputFormat, resolve_config};
use crewlog::storage::Storage;
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        output_format: cli.human_readable.then_some(OutputFormat::Human),
    };

    let config = match resolve_config(&overrides) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(None);
            report_error(&e, cli.human_readable);
            process::exit(1);
        }
    };
    init_tracing(Some(&config));
    let human = config.output_format() == OutputFormat::Human;

    let cmd_name = cli.command.name();
    let start = Instant::now();
    let result = run_command(cli, &config, human);
    debug!(
        command = cmd_name,
        success = result.is_ok(),
        duration_ms = start.elapsed().as_millis() as u64,
        "command finished"
    );

    if let Err(e) = result {
        report_error(&e, human);
        process::exit(1);
    }
}

/// Install the stderr subscriber. `log_level` already reflects `CREW_LOG`.
fn init_tracing(config: Option<&CrewConfig>) {
    let directive = config.map(CrewConfig::log_level).unwrap_or("warn");
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn report_error(e: &crewlog::Error, human: bool) {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
}

fn run_command(cli: Cli, config: &CrewConfig, human: bool) -> Result<(), crewlog::Error> {
    if let Commands::Config {
        command: ConfigCommands::Show,
    } = &cli.command
    {
        output(&commands::config_show(config), human);
        return Ok(());
    }

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let scope = commands::detect_scope(cli.repo_path.as_deref(), cli.branch.as_deref(), &cwd)?;
    debug!(scope = %scope, "resolved scope");
    let mut storage = Storage::open_default(config)?;

    match cli.command {
        Commands::Task { command } => match command {
            TaskCommands::Create {
                title,
                parent,
                notes,
                status,
            } => {
                let result =
                    commands::task_create(&mut storage, &scope, title, parent, notes, status)?;
                output(&result, human);
            }
            TaskCommands::Show { id } => {
                output(&commands::task_show(&storage, &id)?, human);
            }
            TaskCommands::List => {
                output(&commands::task_list(&storage, &scope)?, human);
            }
            TaskCommands::Children { id } => {
                output(&commands::task_children(&storage, &id)?, human);
            }
            TaskCommands::Update {
                id,
                title,
                status,
                notes,
            } => {
                let result = commands::task_update(&mut storage, &id, title, status, notes)?;
                output(&result, human);
            }
            TaskCommands::Close { id } => {
                output(&commands::task_close(&mut storage, &id)?, human);
            }
            TaskCommands::Delete { id } => {
                output(&commands::task_delete(&mut storage, &id)?, human);
            }
        },
        Commands::Agent { command } => match command {
            AgentCommands::Register {
                external_id,
                name,
                kind,
                pid,
            } => {
                let result =
                    commands::agent_register(&mut storage, &scope, external_id, name, kind, pid)?;
                output(&result, human);
            }
            AgentCommands::List { all } => {
                output(&commands::agent_list(&storage, &scope, all)?, human);
            }
            AgentCommands::Show { name } => {
                output(&commands::agent_show(&storage, &name)?, human);
            }
            AgentCommands::Peek { name } => {
                output(&commands::agent_peek(&mut storage, config, &name)?, human);
            }
            AgentCommands::Logs { name } => {
                output(&commands::agent_logs(&mut storage, config, &name)?, human);
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(config), human),
        },
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
