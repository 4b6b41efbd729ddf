use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use fray::config::Config;
use fray::core::{build_graph, MinGranularity, TaskSpec};
use fray::decompose::decompose;
use fray::metrics::LogSink;
use fray::orchestration::{BattleOrchestrator, BattleSummary, RunOptions, DEFAULT_MAX_DEPTH};
use fray::schedule::topological_layers;
use fray::vcs::GitVcs;
use fray::{flog, BattleStatus, Result};

/// Fray - fractal task decomposition and battle orchestration
#[derive(Parser, Debug)]
#[command(name = "fray")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    FRAY_DEBUG=1    Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.fray/fray.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Execute a full battle run for a task spec (JSON file)
    Run {
        /// Path to the task spec JSON file
        spec: PathBuf,

        /// Maximum decomposition depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Finest decomposition axis: "file" or "unbounded"
        #[arg(long)]
        min_granularity: Option<String>,

        /// Maximum concurrently running subtasks
        #[arg(long)]
        max_workers: Option<usize>,

        /// Maximum subtasks per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Per-subtask timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Base branch to fan out from and promote into
        #[arg(long)]
        base_branch: Option<String>,
    },

    /// Decompose and layer a task spec without touching the repository
    Plan {
        /// Path to the task spec JSON file
        spec: PathBuf,

        /// Maximum decomposition depth
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

fn parse_granularity(raw: Option<String>) -> Result<Option<MinGranularity>> {
    match raw.as_deref() {
        None => Ok(None),
        Some("file") => Ok(Some(MinGranularity::File)),
        Some("unbounded") => Ok(Some(MinGranularity::Unbounded)),
        Some(other) => Err(fray::Error::Validation(format!(
            "unknown min granularity '{}' (expected file or unbounded)",
            other
        ))),
    }
}

fn load_spec(path: &PathBuf) -> Result<TaskSpec> {
    let raw = std::fs::read_to_string(path)?;
    let mut spec: TaskSpec = serde_json::from_str(&raw)?;
    spec.ensure_id();
    Ok(spec)
}

async fn run_battle(spec_path: &PathBuf, options: RunOptions) -> Result<BattleSummary> {
    let config = Config::load()?;
    let spec = load_spec(spec_path)?;

    let repo_path = spec.repo.clone().unwrap_or_else(|| PathBuf::from("."));
    let vcs = Arc::new(GitVcs::new(&repo_path)?);

    let orchestrator = BattleOrchestrator::new(config, vcs).with_metrics(Arc::new(LogSink));

    match orchestrator.execute_battle(&spec, &options).await {
        Ok(run) => Ok(BattleSummary::from_run(&run)),
        Err(err) => {
            // A failed run still reports a summary through the submission
            // interface; the error travels inside it.
            Ok(BattleSummary::failed(&spec.id, &err))
        }
    }
}

fn plan_battle(spec_path: &PathBuf, max_depth: Option<usize>) -> Result<serde_json::Value> {
    let spec = load_spec(spec_path)?;
    let mut subtasks = decompose(
        &spec,
        max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        MinGranularity::File,
    )?;
    let graph = build_graph(&mut subtasks);
    let layers = topological_layers(&graph);

    Ok(serde_json::json!({
        "battleId": spec.id,
        "subtaskCount": subtasks.len(),
        "edgeCount": graph.edge_count(),
        "layers": layers,
        "subtasks": subtasks,
    }))
}

async fn dispatch(command: Command) -> Result<(String, BattleStatus)> {
    match command {
        Command::Run {
            spec,
            max_depth,
            min_granularity,
            max_workers,
            batch_size,
            timeout_ms,
            base_branch,
        } => {
            flog!("fray run: spec={}", spec.display());
            let options = RunOptions {
                max_depth,
                min_granularity: parse_granularity(min_granularity)?,
                max_workers,
                batch_size,
                timeout_ms,
                base_branch,
            };
            let summary = run_battle(&spec, options).await?;
            Ok((serde_json::to_string_pretty(&summary)?, summary.status))
        }
        Command::Plan { spec, max_depth } => {
            flog!("fray plan: spec={}", spec.display());
            let plan = plan_battle(&spec, max_depth)?;
            Ok((serde_json::to_string_pretty(&plan)?, BattleStatus::Completed))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    fray::log::init_with_debug(cli.debug);

    match dispatch(cli.command).await {
        Ok((output, status)) => {
            println!("{}", output);
            if status == BattleStatus::Failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("fray: {}", err);
            ExitCode::FAILURE
        }
    }
}
