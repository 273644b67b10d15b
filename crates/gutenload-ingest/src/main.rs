//! gutenload - Project Gutenberg bulk loader

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gutenload_common::logging::{init_logging, LogConfig, LogLevel};
use gutenload_ingest::config::IngestConfig;
use gutenload_ingest::framework::{IngestPipeline, PipelineStats};
use gutenload_ingest::gutenberg::{DuplicatePolicy, GutenbergFetcher, PgBookStore};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gutenload")]
#[command(author, version, about = "Concurrent Project Gutenberg loader for PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a range of books and load them into the database
    Run(RunArgs),

    /// Create or update the database schema
    Migrate {
        /// Duplicate policy the schema must support (allow, ignore, upsert)
        #[arg(long)]
        duplicate_policy: Option<DuplicatePolicy>,

        #[arg(long)]
        database_url: Option<String>,
    },
}

/// Flag overrides; anything unset comes from the environment or defaults
#[derive(Args, Debug)]
struct RunArgs {
    /// First book ID
    #[arg(long)]
    start: Option<u64>,

    /// Last book ID (inclusive)
    #[arg(long)]
    end: Option<u64>,

    /// Concurrent fetch workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Records per database flush
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Seconds before a partial batch is flushed
    #[arg(long)]
    flush_interval: Option<u64>,

    /// Per-download timeout in seconds
    #[arg(long)]
    fetch_timeout: Option<u64>,

    /// Maximum stored content size in bytes
    #[arg(long)]
    max_content_bytes: Option<usize>,

    /// Loader poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Gutenberg mirror root
    #[arg(long)]
    base_url: Option<String>,

    /// allow, ignore or upsert
    #[arg(long)]
    duplicate_policy: Option<DuplicatePolicy>,

    #[arg(long)]
    database_url: Option<String>,

    /// Use default title/author/language instead of fetching RDF metadata
    #[arg(long)]
    skip_metadata: bool,

    /// Do not run migrations before loading
    #[arg(long)]
    skip_migrate: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut IngestConfig) {
        let pipeline = &mut config.pipeline;
        if let Some(start) = self.start {
            pipeline.id_range_start = start;
        }
        if let Some(end) = self.end {
            pipeline.id_range_end = end;
        }
        if let Some(workers) = self.workers {
            pipeline.worker_count = workers;
        }
        if let Some(batch_size) = self.batch_size {
            pipeline.batch_size = batch_size;
        }
        if let Some(secs) = self.flush_interval {
            pipeline.flush_interval_secs = secs;
        }
        if let Some(ms) = self.poll_interval_ms {
            pipeline.poll_interval_ms = ms;
        }
        if let Some(max_bytes) = self.max_content_bytes {
            pipeline.max_content_bytes = max_bytes;
        }

        if let Some(secs) = self.fetch_timeout {
            config.gutenberg.fetch_timeout_secs = secs;
        }
        if let Some(base_url) = &self.base_url {
            config.gutenberg = config.gutenberg.clone().with_base_url(base_url.clone());
        }
        if self.skip_metadata {
            config.gutenberg.skip_metadata = true;
        }
        if let Some(policy) = self.duplicate_policy {
            config.duplicate_policy = policy;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }

        config.sync_limits();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_else(|err| {
        eprintln!("Ignoring invalid LOG_* settings: {:#}", err);
        LogConfig::builder()
            .log_file_prefix("gutenload".to_string())
            .build()
    });
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Migrate {
            duplicate_policy,
            database_url,
        } => {
            let mut config = IngestConfig::from_env()?;
            if let Some(policy) = duplicate_policy {
                config.duplicate_policy = policy;
            }
            if let Some(url) = database_url {
                config.database.url = url;
            }

            let store = PgBookStore::connect(&config.database, config.duplicate_policy)
                .await
                .context("Failed to connect to database")?;
            store.migrate().await.context("Failed to run migrations")?;
            info!("Migrations complete");
            Ok(())
        },
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = IngestConfig::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    // Storage must be reachable before any worker starts
    let store = PgBookStore::connect(&config.database, config.duplicate_policy)
        .await
        .context("Failed to connect to database")?;
    if !args.skip_migrate {
        store.migrate().await.context("Failed to run migrations")?;
    }

    let fetcher =
        GutenbergFetcher::new(config.gutenberg.clone()).context("Failed to build fetcher")?;
    let pipeline = IngestPipeline::new(config.pipeline.clone(), Arc::new(fetcher), Arc::new(store))?;

    let cancel = pipeline.cancellation_token();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let progress = (!args.no_progress).then(|| spawn_progress_bar(pipeline.stats(), cancel.clone()));

    let report = pipeline.run().await?;

    if let Some(handle) = progress {
        handle.abort();
    }

    info!(
        "Loaded {} of {} books ({} processed, {} failed flushes)",
        report.progress.records_stored,
        report.progress.total,
        report.progress.processed,
        report.progress.failed_flushes
    );
    info!(report = %serde_json::to_string(&report)?, "Run report");

    if report.cancelled {
        warn!("Run was cancelled before the whole range was processed");
    }

    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupt received, stopping workers after their current item");
        cancel.cancel();
    }
}

fn spawn_progress_bar(stats: Arc<PipelineStats>, cancel: CancellationToken) -> JoinHandle<()> {
    let total = stats.snapshot().total;
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            ticker.tick().await;
            let snapshot = stats.snapshot();
            pb.set_position(snapshot.processed);
            pb.set_message(format!(
                "{} found, {} stored",
                snapshot.succeeded, snapshot.records_stored
            ));
            if snapshot.is_complete() || cancel.is_cancelled() {
                pb.finish();
                break;
            }
        }
    })
}
