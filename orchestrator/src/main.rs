//! `loki` - the autonomous RARV orchestrator CLI.

use clap::{Parser, Subcommand};
use loki_contracts::{TaskItem, TaskPayload, TaskStatus};
use loki_orchestrator::queue::TaskQueue;
use loki_orchestrator::{Orchestrator, OrchestratorConfig};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "loki")]
#[command(about = "Runs the autonomous Reason/Act/Review/Verify loop against a task queue")]
struct Cli {
    /// Path to a config file (TOML/YAML/JSON) layered over the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the `.loki` state directory.
    #[arg(long)]
    loki_dir: Option<PathBuf>,

    /// Overrides the project directory being worked on.
    #[arg(long)]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the orchestration loop against a PRD description.
    Run {
        /// Natural-language product description driving classification and team composition.
        #[arg(long)]
        prd: String,

        /// Stop after this many completed iterations instead of running until a stop file appears.
        #[arg(long)]
        max_iterations: Option<u64>,
    },
    /// Enqueues a new task onto the pending queue without starting the loop.
    Submit {
        /// Short task title.
        #[arg(long)]
        title: String,

        /// Task type / phase label (e.g. "implementation", "bugfix").
        #[arg(long, default_value = "implementation")]
        task_type: String,

        /// Action the owning agent should take.
        #[arg(long, default_value = "write_code")]
        action: String,

        /// Free-text task description handed to the agent as context.
        #[arg(long, default_value = "")]
        description: String,

        /// Queue position (lower runs first).
        #[arg(long, default_value_t = 0)]
        position: u32,
    },
    /// Writes a stop file so a running loop exits at its next control check.
    Stop,
    /// Writes a pause file so a running loop idles at its next control check.
    Pause,
    /// Removes the pause file so a paused loop resumes.
    Resume,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let cli = Cli::parse();
    let mut config = OrchestratorConfig::load(cli.config.as_deref())?;
    if let Some(loki_dir) = cli.loki_dir {
        config.loki_dir = loki_dir;
    }
    if let Some(project_dir) = cli.project_dir {
        config.project_dir = project_dir;
    }

    match cli.command {
        Commands::Run { prd, max_iterations } => {
            if max_iterations.is_some() {
                config.max_iterations = max_iterations;
            }
            std::fs::create_dir_all(&config.loki_dir)?;
            info!(loki_dir = %config.loki_dir.display(), "starting orchestrator");

            let (mut orchestrator, events_handle, dashboard_handle, shutdown) =
                Orchestrator::new(config, &prd, Box::new(loki_orchestrator::DeterministicExecutor))?;

            if let Err(e) = orchestrator.run(shutdown).await {
                error!(error = %e, "orchestrator loop exited with an error");
                drop(orchestrator);
                let _ = events_handle.await;
                let _ = dashboard_handle.await;
                return Err(e.into());
            }

            drop(orchestrator);
            let _ = events_handle.await;
            let _ = dashboard_handle.await;
            info!("orchestrator loop finished");
        }
        Commands::Submit { title, task_type, action, description, position } => {
            let queue = TaskQueue::new(&config.loki_dir)?;
            let now = chrono::Utc::now();
            let task = TaskItem {
                id: uuid::Uuid::new_v4().to_string(),
                task_type,
                title,
                payload: TaskPayload { action, priority: 1, description },
                status: TaskStatus::Pending,
                position,
                parent_id: None,
                created_at: now,
                updated_at: now,
            };
            queue.enqueue(&task)?;
            info!(task_id = %task.id, "task submitted");
        }
        Commands::Stop => {
            let control_dir = loki_orchestrator::control::control_dir(&config.loki_dir);
            std::fs::create_dir_all(&control_dir)?;
            std::fs::write(control_dir.join("stop"), b"")?;
            info!("stop requested");
        }
        Commands::Pause => {
            let control_dir = loki_orchestrator::control::control_dir(&config.loki_dir);
            std::fs::create_dir_all(&control_dir)?;
            std::fs::write(control_dir.join("pause"), b"")?;
            info!("pause requested");
        }
        Commands::Resume => {
            let control_dir = loki_orchestrator::control::control_dir(&config.loki_dir);
            let _ = std::fs::remove_file(control_dir.join("pause"));
            info!("resume requested");
        }
    }

    Ok(())
}
