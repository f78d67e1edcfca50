use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use gravity_jobs::config::{IntegratorConfig, QueuePolicy, SchedulerConfig, ServiceConfig};
use gravity_jobs::notifier::{Channel, SessionEvents};
use gravity_jobs::problem::{BodyPayload, ProblemPayload, TimeRange};
use gravity_jobs::service::{JobRequest, Rejection, SolverService};
use gravity_jobs::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "gravity-jobs")]
#[command(version)]
#[command(about = "Solve batches of N-body gravitation problems on a worker pool")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Solve every job in a JSON file and print a summary
    Run(RunArgs),

    /// Print an example job file (three bodies at rest)
    Template,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// JSON file holding an array of jobs ({id, type, problem})
    input: PathBuf,

    /// Number of pool workers
    #[arg(long, short = 'w', default_value = "4")]
    workers: usize,

    /// Bound the intake queue to this many dispatches (unbounded if unset)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// What to do when a bounded queue is full: block or reject
    #[arg(long, default_value = "block")]
    queue_policy: QueuePolicy,

    /// Relative error tolerance of the integrator
    #[arg(long)]
    rtol: Option<f64>,

    /// Absolute error tolerance of the integrator
    #[arg(long)]
    atol: Option<f64>,

    /// Per-job solve budget in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Also reduce every successful trajectory for plotting
    #[arg(long)]
    postprocess: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobSummary {
    job_id: String,
    status: String,
    worker: Option<String>,
    elapsed_ms: Option<u64>,
    samples: usize,
    bodies: usize,
    energy_drift: Option<f64>,
}

#[derive(Serialize)]
struct RunOutput {
    session_id: String,
    jobs: Vec<JobSummary>,
    rejected: Vec<Rejection>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn integrator_config(args: &RunArgs) -> IntegratorConfig {
    let mut config = IntegratorConfig::default();
    if let Some(rtol) = args.rtol {
        config.rtol = rtol;
    }
    if let Some(atol) = args.atol {
        config.atol = atol;
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_solve_timeout(Duration::from_secs(secs));
    }
    config
}

fn scheduler_config(args: &RunArgs) -> SchedulerConfig {
    let config = SchedulerConfig::new(args.workers).with_integrator(integrator_config(args));
    match args.queue_capacity {
        Some(capacity) => config.with_queue(capacity, args.queue_policy),
        None => config,
    }
}

/// Wait for one event per id in `pending` on `channel`. Returns false if
/// interrupted or the event stream ended first.
async fn await_events(
    events: &mut SessionEvents,
    channel: Channel,
    mut pending: HashSet<String>,
    token: &tokio_util::sync::CancellationToken,
) -> bool {
    while !pending.is_empty() {
        tokio::select! {
            _ = token.cancelled() => return false,
            event = events.recv() => match event {
                Some(event) if event.channel == channel => {
                    tracing::info!(
                        job_id = %event.job_id,
                        succeeded = event.succeeded,
                        channel = %event.channel,
                        "Job completed"
                    );
                    pending.remove(&event.job_id);
                }
                Some(_) => {}
                None => return false,
            }
        }
    }
    true
}

fn template() -> Vec<JobRequest> {
    vec![JobRequest::classical_gravitation(
        "three-body",
        ProblemPayload::new(
            vec![
                BodyPayload::at_rest(vec![-2.0, 0.0], 1.0),
                BodyPayload::at_rest(vec![2.0, 2.0], 1.0),
                BodyPayload::at_rest(vec![1.0, -2.0], 2.0),
            ],
            1.0,
            TimeRange(0.0, 100.0, 10_000),
        ),
    )]
}

// =============================================================================
// Run Implementation
// =============================================================================

async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(&args.input).await?;
    let requests: Vec<JobRequest> = serde_json::from_str(&raw)?;
    tracing::info!(jobs = requests.len(), input = %args.input.display(), "Loaded job file");

    let service = SolverService::new(ServiceConfig {
        scheduler: scheduler_config(&args),
        ..Default::default()
    })?;
    let token = install_shutdown_handler();

    let session_id = service.connect().await;
    let mut events = service.subscribe(&session_id);
    let report = service.on_submit(&session_id, requests).await?;

    let mut finished = await_events(
        &mut events,
        Channel::Process,
        report.accepted.iter().cloned().collect(),
        &token,
    )
    .await;

    if finished && args.postprocess {
        let mut solved = Vec::new();
        for job_id in &report.accepted {
            if service.on_retrieve(&session_id, job_id).await.status {
                solved.push(job_id.clone());
            }
        }
        let pending = solved.iter().cloned().collect();
        service.on_postprocess(&session_id, solved).await?;
        finished = await_events(&mut events, Channel::Postprocess, pending, &token).await;
    }

    if !finished {
        tracing::warn!("Interrupted before all jobs finished");
    }

    let mut jobs = Vec::with_capacity(report.accepted.len());
    for job_id in &report.accepted {
        let response = service.on_retrieve(&session_id, job_id).await;
        let Some(record) = response.record else {
            continue;
        };
        let (samples, bodies, _) = record.solution.shape();
        jobs.push(JobSummary {
            job_id: job_id.clone(),
            status: record.status.to_string(),
            worker: record.worker.as_ref().map(|w| w.name.clone()),
            elapsed_ms: record.worker.as_ref().map(|w| w.elapsed.as_millis() as u64),
            samples,
            bodies,
            energy_drift: record
                .export
                .as_ref()
                .and_then(|e| e.conservation.as_ref())
                .map(|c| c.energy_drift),
        });
    }

    service.on_client_disconnect(&session_id).await;
    service.shutdown().await?;

    let output = RunOutput {
        session_id,
        jobs,
        rejected: report.rejected,
    };
    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => print_table(&output),
    }
    Ok(())
}

fn print_table(output: &RunOutput) {
    println!("Session: {}", output.session_id);
    println!();
    if output.jobs.is_empty() {
        println!("No jobs solved.");
    } else {
        println!(
            "{:<34} {:<10} {:<18} {:>10} {:>8} {:>12}",
            "JOB ID", "STATUS", "WORKER", "MS", "SAMPLES", "ENERGY DRIFT"
        );
        println!("{}", "-".repeat(97));
        for job in &output.jobs {
            println!(
                "{:<34} {:<10} {:<18} {:>10} {:>8} {:>12}",
                job.job_id,
                job.status,
                job.worker.as_deref().unwrap_or("-"),
                job.elapsed_ms.map(|ms| ms.to_string()).unwrap_or_else(|| "-".to_string()),
                job.samples,
                job.energy_drift
                    .map(|d| format!("{:.3e}", d))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    }

    if !output.rejected.is_empty() {
        println!();
        println!("Rejected:");
        for rejection in &output.rejected {
            println!("  {}: {}", rejection.job_id, rejection.reason);
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match args.command {
        Commands::Run(run_args) => run(run_args).await?,
        Commands::Template => {
            println!("{}", serde_json::to_string_pretty(&template())?);
        }
    }

    Ok(())
}
