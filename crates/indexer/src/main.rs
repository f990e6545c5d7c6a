//! Songchart Indexer - Chart event indexing, scoring, and trending reports
//!
//! This binary provides:
//! - Event replay from the Chart contract into the SQLite cache
//! - Periodic score recomputation
//! - Trending digests to Slack
//! - Read-only views of the cached rankings
//!
//! Note: serving rankings over HTTP is left to a separate service

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use songchart_indexer::config::{Config, LoggingConfig, TrendingConfig};
use songchart_indexer::listener::{LedgerReader, RpcProvider, SyncEngine};
use songchart_indexer::metadata::{DecryptMetadata, MetadataSource, YoutubeMetadata};
use songchart_indexer::notifier::{Notifier, SlackWebhook};
use songchart_indexer::scheduler::IntervalJob;
use songchart_indexer::score_service::ScoreEngine;
use songchart_indexer::storage::{keys, Storage};
use songchart_indexer::trending::TrendingReporter;
use songchart_indexer::{ScoreParams, KIND_DECRYPT};
use std::sync::Arc;
use tracing::{error, info, warn};

const POLL_CONTRACT_JOB: &str = "poll-contract";
const UPDATE_SCORE_JOB: &str = "update-song-score";
const REPORT_TRENDING_JOB: &str = "report-trending";
const DEFAULT_DATABASE_URL: &str = "sqlite://songchart.db";

#[derive(Parser)]
#[command(name = "songchart-indexer")]
#[command(version, about = "Songchart indexer for Chart contract events", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the indexer service (sync + scores + trending)
    Run,

    /// Show cache status and job progress
    Status,

    /// Print items ranked by score as JSON
    Leaderboard {
        /// Items to skip
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Items to return
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },

    /// Print items ranked by proposal time (newest first) as JSON
    Songs {
        /// Items to skip
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Items to return
        #[arg(long, default_value_t = 20)]
        limit: u64,

        /// Oldest first
        #[arg(long)]
        reverse: bool,
    },

    /// Wipe all cached state; the next run replays from the start block
    ClearCache,

    /// Send a trending report now
    ReportTrending,

    /// Initialize the database
    InitDb {
        /// Database URL
        #[arg(long, default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    let config = match &command {
        Commands::InitDb { .. } => None,
        Commands::Status => load_optional_config(&cli.config)?,
        _ => Some(Config::from_file(&cli.config).context("Failed to load configuration")?),
    };

    let default_logging = LoggingConfig::default();
    init_logging(
        cli.debug,
        config.as_ref().map_or(&default_logging, |c| &c.logging),
    )?;

    info!("Songchart Indexer starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match command {
        Commands::Run => run_indexer(&require(config)?).await?,
        Commands::Status => show_status(config.as_ref()).await?,
        Commands::Leaderboard { offset, limit } => {
            show_leaderboard(&require(config)?, offset, limit).await?
        }
        Commands::Songs {
            offset,
            limit,
            reverse,
        } => show_songs(&require(config)?, offset, limit, reverse).await?,
        Commands::ClearCache => clear_cache(&require(config)?).await?,
        Commands::ReportTrending => report_trending_now(&require(config)?).await?,
        Commands::InitDb { database_url } => init_database(&database_url).await?,
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("songchart_indexer=debug,songchart_core=debug,sqlx=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "songchart_indexer={0},songchart_core={0},sqlx=warn",
                logging.level
            ))
        })
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

fn require(config: Option<Config>) -> Result<Config> {
    config.context("Configuration is required for this command")
}

/// Load the config file, treating a missing file as "no config".
fn load_optional_config(config_path: &str) -> Result<Option<Config>> {
    match Config::from_file(config_path) {
        Ok(config) => Ok(Some(config)),
        Err(e) => {
            // Config::from_file wraps errors with context, so walk the chain
            let is_not_found = e.chain().any(|cause| {
                cause
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
            });

            if is_not_found {
                Ok(None)
            } else {
                Err(e).context("Failed to load config file")
            }
        }
    }
}

/// Connect to the configured database and apply migrations.
async fn open_storage(config: &Config) -> Result<Storage> {
    let storage = Storage::new(
        &config.database.url,
        Some(config.database.max_connections),
        Some(config.database.min_connections),
    )
    .await
    .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    Ok(storage)
}

/// Connect to the RPC node and check it serves the configured chain.
async fn connect_ledger(config: &Config) -> Result<Arc<dyn LedgerReader>> {
    let provider = RpcProvider::new(&config.network.rpc_url, config.contracts.chart)
        .await
        .context("Failed to create RPC provider")?;

    provider
        .ensure_chain_id(config.network.chain_id)
        .await
        .context("Unknown network")?;

    info!("RPC provider initialized");
    Ok(Arc::new(provider))
}

/// Build the trending reporter, or `None` when no webhook is configured.
fn build_reporter(
    config: &Config,
    ledger: Arc<dyn LedgerReader>,
    storage: Storage,
    params: ScoreParams,
) -> Result<Option<TrendingReporter>> {
    let Some(webhook) = config.trending.webhook() else {
        return Ok(None);
    };

    let metadata = build_metadata(&config.trending, storage.clone())?;
    let notifier: Arc<dyn Notifier> = Arc::new(SlackWebhook::new(webhook.to_string())?);

    Ok(Some(TrendingReporter::new(
        ledger,
        storage,
        metadata,
        notifier,
        params,
        config.trending.report_settings(),
    )))
}

/// Metadata source for the reported content type.
fn build_metadata(trending: &TrendingConfig, storage: Storage) -> Result<Arc<dyn MetadataSource>> {
    if trending.content_type == KIND_DECRYPT {
        let source = match &trending.decrypt_base_url {
            Some(base_url) => DecryptMetadata::with_base_url(base_url.clone(), storage)?,
            None => DecryptMetadata::new(storage)?,
        };
        return Ok(Arc::new(source));
    }

    // Presence is checked by Config::validate whenever a webhook is set
    let api_key = trending.youtube_api_key.clone().unwrap_or_default();
    let source = match &trending.youtube_api_base {
        Some(api_base) => YoutubeMetadata::with_api_base(api_base.clone(), api_key, storage)?,
        None => YoutubeMetadata::new(api_key, storage)?,
    };
    Ok(Arc::new(source))
}

/// Main indexer service - runs the interval jobs until Ctrl+C
async fn run_indexer(config: &Config) -> Result<()> {
    info!("Configuration loaded successfully");
    info!("  Chain ID: {}", config.network.chain_id);
    info!("  RPC URL: {}", config.network.rpc_url);
    info!("  Chart: {}", config.contracts.chart);
    info!("  Database: {}", config.database.url);
    info!("  Start block: {}", config.sync.start_block);

    let params = config.score.params()?;
    if config.score.upvote_weight.is_some() || config.score.decay_per_block.is_some() {
        info!(
            "  Score: custom (based on {} v{}), K1={}, K2={}",
            config.score.preset.as_str(),
            config.score.preset.version(),
            params.upvote_weight,
            params.decay_per_block
        );
    } else {
        info!(
            "  Score: {} v{}, K1={}, K2={}",
            config.score.preset.as_str(),
            config.score.preset.version(),
            params.upvote_weight,
            params.decay_per_block
        );
    }

    let storage = open_storage(config).await?;
    info!("Database initialized");

    let ledger = connect_ledger(config).await?;
    let decimals = config.contracts.decimals;

    let sync_engine = SyncEngine::new(
        ledger.clone(),
        storage.clone(),
        config.sync.clone(),
        decimals,
    );
    let score_engine = ScoreEngine::new(ledger.clone(), storage.clone(), params, decimals);

    let mut jobs = vec![
        IntervalJob::new(
            POLL_CONTRACT_JOB,
            Arc::new(sync_engine),
            storage.clone(),
            config.sync_interval(),
        ),
        IntervalJob::new(
            UPDATE_SCORE_JOB,
            Arc::new(score_engine),
            storage.clone(),
            config.score_interval(),
        ),
    ];

    match build_reporter(config, ledger.clone(), storage.clone(), params)? {
        Some(reporter) => {
            let (interval, poll_interval) = config.trending_intervals();
            jobs.push(
                IntervalJob::new(
                    REPORT_TRENDING_JOB,
                    Arc::new(reporter),
                    storage.clone(),
                    interval,
                )
                .with_poll_interval(poll_interval),
            );
        }
        None => info!("Trending reports disabled (no trending.webhook_url)"),
    }

    let mut tasks = tokio::task::JoinSet::new();
    for job in jobs {
        tasks.spawn(async move {
            job.run().await;
            job.name().to_string()
        });
    }

    info!("Indexer is running. Press Ctrl+C to stop.");

    let result = tokio::select! {
        Some(joined) = tasks.join_next() => match joined {
            Ok(name) => {
                warn!("Job {} exited unexpectedly", name);
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("Job task panicked: {}", e)),
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Received shutdown signal, gracefully shutting down...");
            Ok(())
        }
    };

    tasks.abort_all();
    storage.close().await;
    result
}

/// Show cache status and job progress
async fn show_status(config: Option<&Config>) -> Result<()> {
    let storage = match config {
        Some(config) => {
            info!("Using database from config: {}", config.database.url);
            open_storage(config).await?
        }
        None => {
            info!(
                "Config file not found, using default database: {}",
                DEFAULT_DATABASE_URL
            );
            let storage = Storage::new(DEFAULT_DATABASE_URL, None, None)
                .await
                .context("Failed to connect to database")?;
            storage
                .run_migrations()
                .await
                .context("Failed to run migrations")?;
            storage
        }
    };

    let stats = storage.stats().await?;

    println!("\n=== Songchart Indexer Status ===\n");
    println!("Sync Progress:");
    match stats.cursor {
        Some(block) => println!("  Last Block: {}", block),
        None => println!("  Last Block: none (will replay from start block)"),
    }

    println!("\nCache Statistics:");
    println!("  Tracked Items: {}", stats.tracked_items);
    println!("  Scored Items: {}", stats.scored_items);

    println!("\nJobs:");
    for job in [POLL_CONTRACT_JOB, UPDATE_SCORE_JOB, REPORT_TRENDING_JOB] {
        let last_run = storage
            .get_last_run(&keys::job_last_run(job))
            .await?
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!("  {}: last run {}", job, last_run);
    }

    println!();

    storage.close().await;

    Ok(())
}

/// Print the score leaderboard
async fn show_leaderboard(config: &Config, offset: u64, limit: u64) -> Result<()> {
    let storage = open_storage(config).await?;

    let items = storage.leaderboard(offset, limit).await?;
    println!("{}", serde_json::to_string_pretty(&items)?);

    storage.close().await;
    Ok(())
}

/// Print items by proposal time
async fn show_songs(config: &Config, offset: u64, limit: u64, reverse: bool) -> Result<()> {
    let storage = open_storage(config).await?;

    let items = storage
        .items_by_proposal_time(offset, limit, reverse)
        .await?;
    println!("{}", serde_json::to_string_pretty(&items)?);

    storage.close().await;
    Ok(())
}

/// Wipe all derived state
async fn clear_cache(config: &Config) -> Result<()> {
    let storage = open_storage(config).await?;

    storage.clear_all().await?;
    info!("Cache cleared; the next indexing pass replays from block {}", config.sync.start_block);

    storage.close().await;
    Ok(())
}

/// Manually trigger a trending report
async fn report_trending_now(config: &Config) -> Result<()> {
    if config.trending.webhook().is_none() {
        anyhow::bail!("trending.webhook_url is not configured");
    }

    let storage = open_storage(config).await?;
    let ledger = connect_ledger(config).await?;
    let params = config.score.params()?;

    let Some(reporter) = build_reporter(config, ledger, storage.clone(), params)? else {
        anyhow::bail!("trending.webhook_url is not configured");
    };

    let outcome = reporter.report_trending().await;
    storage.close().await;

    match outcome {
        Ok(outcome) => {
            info!("Trending report finished: {:?}", outcome);
            Ok(())
        }
        Err(e) => {
            error!("Trending report failed: {:#}", e);
            Err(e)
        }
    }
}

/// Initialize the database
async fn init_database(database_url: &str) -> Result<()> {
    info!("Initializing database: {}", database_url);

    let storage = Storage::new(database_url, None, None)
        .await
        .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    storage
        .health_check()
        .await
        .context("Database health check failed")?;

    let stats = storage.stats().await?;
    info!("Database initialized successfully!");
    info!("  Tracked items: {}", stats.tracked_items);
    info!("  Scored items: {}", stats.scored_items);
    info!("  Cursor: {:?}", stats.cursor);

    storage.close().await;

    Ok(())
}
