use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use foreman::graph::{GoalGraph, GraphStore};
use foreman::lock::LockManager;
use foreman::{Config, Result, TaskStatus};

/// Foreman - dependency-aware task coordination with file locking
#[derive(Parser, Debug)]
#[command(name = "foreman")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Verbose logging (tracing env-filter syntax)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validate a goal graph file and print any issues found
    Validate {
        /// Path to a goal graph JSON file
        path: PathBuf,
    },
    /// Show the latest persisted goal graph and per-status counts
    Status,
    /// List active lock records
    Locks,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load()?;

    match cli.command {
        Command::Validate { path } => {
            let contents = std::fs::read_to_string(&path)?;
            let mut graph: GoalGraph = serde_json::from_str(&contents)?;
            graph.normalize();
            let issues = graph.validate();
            if issues.is_empty() {
                println!("{}: {} tasks, no issues", path.display(), graph.len());
                Ok(ExitCode::SUCCESS)
            } else {
                for issue in &issues {
                    println!("{}", issue);
                }
                println!("{} issue(s) found", issues.len());
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Status => {
            let store = GraphStore::new(&config.graph_dir()?);
            let graph = store.load(None);
            if graph.is_empty() {
                println!("no goal graph persisted yet");
                return Ok(ExitCode::SUCCESS);
            }
            println!("{} tasks", graph.len());
            let counts = graph.status_counts();
            for status in [
                TaskStatus::NotStarted,
                TaskStatus::InProgress,
                TaskStatus::NeedsReview,
                TaskStatus::NeedsFixes,
                TaskStatus::Completed,
            ] {
                if let Some(count) = counts.get(&status) {
                    println!("  {:<12} {}", format!("{}", status), count);
                }
            }
            for task in &graph.tasks {
                println!(
                    "  [{}] {} ({}, {}, owner: {})",
                    task.id, task.name, task.priority, task.status, task.owner
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Locks => {
            let manager = LockManager::new(&config.lock_dir()?);
            let active = manager.active_locks();
            if active.is_empty() {
                println!("no active locks");
                return Ok(ExitCode::SUCCESS);
            }
            let mut entries: Vec<_> = active.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (resource, record) in entries {
                println!(
                    "{} held by {} ({}) until {}",
                    resource.display(),
                    record.owner_id,
                    if record.exclusive { "exclusive" } else { "shared" },
                    record.expires_at()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
