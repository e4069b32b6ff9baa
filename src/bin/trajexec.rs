//! trajexec: execute precomputed motion-plan solutions against simulated controllers
//!
//! Usage:
//!   trajexec run --model robot.yaml --solution solution.json     → execute one goal
//!   trajexec run ... --no-execution                               → goal is rejected (execution disabled)
//!   trajexec check --model robot.yaml --solution solution.json   → build the plan only
//!   trajexec default-config                                       → print the default TOML config
//!   trajexec version                                              → show version

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use trajexec::{LoggingConfig, Runtime, TrajexecConfig};
use trajexec_core::{ExecuteSolutionGoal, Solution};
use trajexec_model::RobotModel;

#[derive(Parser)]
#[command(
    name = "trajexec",
    about = "Execute precomputed motion-plan solutions segment by segment",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Robot description (YAML)
    #[arg(short, long)]
    model: PathBuf,

    /// Solution to execute (JSON)
    #[arg(short, long)]
    solution: PathBuf,

    /// Path to config file (TOML)
    #[arg(short, long, default_value = "trajexec.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a solution and report feedback and the terminal result
    Run {
        #[command(flatten)]
        inputs: Inputs,

        /// Write logs to a file (in addition to stderr)
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Reject the goal as if trajectory execution were disabled
        #[arg(long, default_value_t = false)]
        no_execution: bool,

        /// Override the simulated time scale
        #[arg(long)]
        time_scale: Option<f64>,

        /// Log JSON lines
        #[arg(long, default_value_t = false)]
        json_logs: bool,
    },
    /// Build the plan for a solution without executing it
    Check {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Print the default configuration as TOML
    DefaultConfig,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            inputs,
            log_file,
            no_execution,
            time_scale,
            json_logs,
        } => {
            let mut config = TrajexecConfig::load(&inputs.config);
            if no_execution {
                config.execution.allow_trajectory_execution = false;
            }
            if let Some(scale) = time_scale {
                config.simulation.time_scale = scale;
            }
            if json_logs {
                config.logging.json = true;
            }
            let _guard = init_tracing(&config.logging, log_file.as_deref())?;
            run(&inputs, &config).await?;
        }
        Commands::Check { inputs } => {
            let config = TrajexecConfig::load(&inputs.config);
            let _guard = init_tracing(&config.logging, None)?;
            check(&inputs, &config).await?;
        }
        Commands::DefaultConfig => {
            print!("{}", TrajexecConfig::default().to_toml()?);
        }
        Commands::Version => {
            println!("trajexec v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file, guard) = match log_file {
        Some(path) => {
            let name = path
                .file_name()
                .with_context(|| format!("invalid log file path {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
    Ok(guard)
}

fn load_inputs(inputs: &Inputs) -> anyhow::Result<(RobotModel, Solution)> {
    let model = RobotModel::load_yaml(&inputs.model)
        .with_context(|| format!("failed to load robot model {}", inputs.model.display()))?;
    let json = std::fs::read_to_string(&inputs.solution)
        .with_context(|| format!("failed to read solution {}", inputs.solution.display()))?;
    let solution = Solution::from_json(&json)
        .with_context(|| format!("failed to parse solution {}", inputs.solution.display()))?;
    info!(
        "Loaded solution {} with {} sub-trajectories",
        inputs.solution.display(),
        solution.len()
    );
    Ok((model, solution))
}

async fn run(inputs: &Inputs, config: &TrajexecConfig) -> anyhow::Result<()> {
    let (model, solution) = load_inputs(inputs)?;
    let runtime = Runtime::new(model, config);
    runtime.server().initialize()?;

    let mut handle = runtime.client().send_goal(ExecuteSolutionGoal::new(solution))?;
    info!("Goal {} submitted", handle.id());

    let cancel = handle.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, preempting goal");
            cancel.cancel();
        }
    });

    while let Some(feedback) = handle.next_feedback().await {
        println!("sub-trajectory {} done", feedback);
    }
    let outcome = handle.wait().await?;
    interrupt.abort();
    runtime.server().shutdown().await;

    println!("{} [{}]: {}", outcome.status, outcome.code(), outcome.text);
    outcome.into_result()?;
    Ok(())
}

async fn check(inputs: &Inputs, config: &TrajexecConfig) -> anyhow::Result<()> {
    let (model, solution) = load_inputs(inputs)?;
    let runtime = Runtime::new(model, config);
    let plan = runtime.check(&solution).await?;

    println!(
        "Plan: {} sub-trajectories, {:.2}s of motion",
        plan.len(),
        plan.duration().as_secs_f64()
    );
    for segment in plan.segments() {
        println!(
            "  {:>7}  group={:<16} waypoints={:<5} controllers=[{}]{}",
            segment.label,
            segment.trajectory.group_name().unwrap_or("-"),
            segment.trajectory.waypoint_count(),
            segment.controllers.join(", "),
            if segment.effect.scene_diff().is_empty() {
                ""
            } else {
                "  +scene diff"
            }
        );
    }
    Ok(())
}
