//! Hive CLI - run a task manifest through the supervisor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use hive_supervisor::{
    metrics, CircuitBreakerConfig, RetryBackoff, Supervisor, SupervisorConfig, TaskStatus,
    TaskSubmission,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod workers;

/// Hive - supervise a pool of workers against a task queue
#[derive(Parser)]
#[command(name = "hive")]
#[command(about = "Run task manifests against demo workers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit every task in a manifest and run until all have settled
    Run {
        /// JSON array of {id, type, input, priority}
        manifest: PathBuf,

        /// Maximum tasks running at once
        #[arg(long, default_value_t = 5)]
        max_concurrent: usize,

        /// Per-attempt timeout in milliseconds
        #[arg(long, default_value_t = 60_000)]
        timeout_ms: u64,

        /// Retries after the first failed attempt
        #[arg(long, default_value_t = 3)]
        max_retries: u32,

        /// Dispatch loop fallback poll interval in milliseconds
        #[arg(long, default_value_t = 100)]
        poll_interval_ms: u64,

        /// Take a worker out of rotation after this many consecutive failures
        #[arg(long)]
        breaker_threshold: Option<u32>,

        /// How long a tripped worker stays out, in milliseconds
        #[arg(long, default_value_t = 30_000)]
        breaker_reset_ms: u64,

        /// Base delay before a failed task is retried, in milliseconds
        #[arg(long)]
        backoff_ms: Option<u64>,

        /// Upper bound on the retry delay, in milliseconds
        #[arg(long, default_value_t = 30_000)]
        backoff_max_ms: u64,

        /// Print Prometheus-style counts to stderr when done
        #[arg(long)]
        metrics: bool,
    },

    /// List the built-in demo workers
    Workers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            manifest,
            max_concurrent,
            timeout_ms,
            max_retries,
            poll_interval_ms,
            breaker_threshold,
            breaker_reset_ms,
            backoff_ms,
            backoff_max_ms,
            metrics,
        } => {
            let mut config = SupervisorConfig::default()
                .with_max_concurrent_tasks(max_concurrent)
                .with_task_timeout(Duration::from_millis(timeout_ms))
                .with_max_retries(max_retries)
                .with_poll_interval(Duration::from_millis(poll_interval_ms));
            if let Some(failure_threshold) = breaker_threshold {
                config = config.with_circuit_breaker(CircuitBreakerConfig {
                    failure_threshold,
                    reset_timeout: Duration::from_millis(breaker_reset_ms),
                    ..CircuitBreakerConfig::default()
                });
            }
            if let Some(base_ms) = backoff_ms {
                let backoff = RetryBackoff::new(
                    Duration::from_millis(base_ms),
                    Duration::from_millis(backoff_max_ms),
                );
                config = config.with_retry_backoff(backoff);
            }

            let all_ok = run_manifest(&manifest, config, metrics).await?;
            if !all_ok {
                std::process::exit(1);
            }
        }
        Commands::Workers => {
            println!("{:<10}  {}", "WORKER", "CAPABILITIES");
            println!("{}", "-".repeat(30));
            for (worker_id, capabilities) in workers::DEMO_WORKERS {
                println!("{:<10}  {}", worker_id, capabilities.join(", "));
            }
        }
    }

    Ok(())
}

/// Returns false if any task ended in a non-completed state.
async fn run_manifest(
    path: &Path,
    config: SupervisorConfig,
    print_metrics: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    let submissions: Vec<TaskSubmission> = serde_json::from_str(&raw)?;

    let supervisor = Supervisor::new(config)?;
    workers::register_demo_workers(&supervisor).await;

    for submission in submissions {
        supervisor.submit(submission).await?;
    }

    info!(path = %path.display(), "Manifest loaded");
    supervisor.orchestrate().await;

    let tasks = supervisor.tasks().await;
    println!("{}", serde_json::to_string_pretty(&tasks)?);

    if print_metrics {
        eprint!("{}", metrics::render(&supervisor.snapshot().await));
    }

    Ok(tasks
        .iter()
        .all(|task| task.status == TaskStatus::Completed))
}
