use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use presentation_worker::{
    config::Config,
    generation::GeminiClient,
    jobs::{
        Dispatcher, Job, JobStore, JobSubmitter, LifecycleController, NotificationHub,
        PresentationStyle, RedisBackend, TaskExecutor, WorkerPool,
    },
    observability::{WorkerMetrics, init_metrics, init_tracing},
};

#[derive(Parser)]
#[command(name = "presentation-worker")]
#[command(version)]
#[command(about = "Background worker that generates presentations for queued jobs")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = presentation_worker::config::DEFAULT_CONFIG_FILE)]
    config: String,

    /// Redis URL (overrides config file and environment)
    #[arg(short = 'r', long, value_name = "URL")]
    redis_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Process queued jobs until SIGINT/SIGTERM (default)
    Run,
    /// Enqueue a job and notify running workers
    Enqueue {
        /// Topic of the presentation
        #[arg(short, long)]
        prompt: String,
        /// Requested slide count, clamped to 5..=20 by the worker
        #[arg(short, long)]
        slides: Option<i64>,
        /// balanced, modern, corporate, creative or academic
        #[arg(long)]
        style: Option<String>,
        /// Job id; a random UUID when omitted
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Show the stored status and result of a job
    Status {
        job_id: String,
        /// Print the stored result as well
        #[arg(long)]
        show_result: bool,
    },
    /// Print the effective configuration with secrets redacted
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let mut config = Config::load_from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    if let Some(redis_url) = cli.redis_url {
        config.redis.url = redis_url;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_worker(config).await,
        Command::Enqueue {
            prompt,
            slides,
            style,
            job_id,
        } => enqueue(config, prompt, slides, style, job_id).await,
        Command::Status {
            job_id,
            show_result,
        } => show_status(config, &job_id, show_result).await,
        Command::PrintConfig => {
            print!("{}", config.redacted().to_toml()?);
            Ok(())
        }
    }
}

async fn run_worker(config: Config) -> Result<()> {
    config.validate_for_worker()?;
    info!(
        queue = %config.redis.queue_key,
        max_concurrent_jobs = config.worker.max_concurrent_jobs,
        "Starting presentation worker"
    );

    let meter_provider = init_metrics();
    let metrics = WorkerMetrics::global();

    let backend = Arc::new(RedisBackend::connect(&config.redis).await?);
    let generator = Arc::new(GeminiClient::new(&config.generation)?);

    let lifecycle = LifecycleController::new(config.worker.shutdown_grace);
    let signals = lifecycle.listen_for_signals()?;

    let hub = NotificationHub::new(config.worker.notification_capacity);
    let listener = hub.subscribe();
    let relay = backend
        .start_notification_relay(hub, lifecycle.token())
        .await?;

    let executor = TaskExecutor::new(backend.clone(), generator, config.worker.retention)
        .with_metrics(metrics.clone());
    let pool = Arc::new(WorkerPool::new(
        Arc::new(executor),
        config.worker.max_concurrent_jobs,
        config.worker.job_deadline,
    ));
    let dispatcher =
        Dispatcher::new(backend, pool.clone(), listener, &config.worker).with_metrics(metrics);

    let report = lifecycle.run(dispatcher, pool).await;
    if report.abandoned > 0 {
        warn!(
            abandoned = report.abandoned,
            "Exiting with jobs still in flight; they remain marked processing"
        );
    }

    if let Err(e) = relay.await {
        warn!("Notification relay ended abnormally: {}", e);
    }
    signals.abort();
    if let Err(e) = meter_provider.shutdown() {
        warn!("Failed to shut down metrics: {}", e);
    }
    Ok(())
}

async fn enqueue(
    config: Config,
    prompt: String,
    slides: Option<i64>,
    style: Option<String>,
    job_id: Option<String>,
) -> Result<()> {
    let backend = Arc::new(RedisBackend::connect(&config.redis).await?);

    let mut job = Job::new(
        job_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        prompt,
    );
    if let Some(slides) = slides {
        job = job.with_slides(slides);
    }
    if let Some(style) = style {
        job = job.with_style(PresentationStyle::from_lenient(&style));
    }

    JobSubmitter::new(backend.clone(), backend).submit(&job).await?;
    println!("{}", job.job_id);
    Ok(())
}

async fn show_status(config: Config, job_id: &str, show_result: bool) -> Result<()> {
    let backend = RedisBackend::connect(&config.redis).await?;

    let status = backend.status(job_id).await?;
    match status {
        Some(status) => println!("{job_id}: {status}"),
        None => println!("{job_id}: unknown (never processed or expired)"),
    }

    if show_result {
        match backend.result(job_id).await? {
            Some(result) => println!("{result}"),
            None => println!("no result stored"),
        }
    }
    Ok(())
}
