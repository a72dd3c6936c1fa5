//! Transferwatch - ERC-1155 transfer ingestion
//!
//! This binary provides:
//! - Historical backfill of transfers to the watched account
//! - Live polling behind a confirmation depth
//! - Status reporting for operators
//!
//! Alerting and notification delivery read the record store separately.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use transferwatch_indexer::config::{Config, LoggingConfig};
use transferwatch_indexer::listener::{ChainClient, RpcProvider, SyncEngine};
use transferwatch_indexer::storage::{Storage, Stores};

#[derive(Parser)]
#[command(name = "transferwatch")]
#[command(version, about = "Watches ERC-1155 transfers to an account", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "transferwatch.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Backfill, then poll for new transfers until stopped
    Run,

    /// Run the historical backfill only, then exit
    Backfill,

    /// Show checkpoint, chain lag and recent records
    Status,

    /// Initialize the SQLite database
    InitDb {
        /// Database URL
        #[arg(long, default_value = "sqlite://transferwatch.db")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        config,
        debug,
        command,
    } = Cli::parse();

    match command.unwrap_or(Commands::Run) {
        Commands::Run => run_indexer(load_config(&config, debug)?).await,
        Commands::Backfill => run_backfill(load_config(&config, debug)?).await,
        Commands::Status => show_status(load_config(&config, debug)?).await,
        Commands::InitDb { database_url } => {
            init_logging(debug, &LoggingConfig::default())?;
            init_database(&database_url).await
        }
    }
}

/// Load and validate configuration, then initialize logging from it.
fn load_config(path: &str, debug: bool) -> Result<Config> {
    let config = Config::from_file(path).context("Failed to load configuration")?;

    init_logging(debug, &config.logging)?;

    info!("Transferwatch starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", path);
    info!("  RPC URL: {}", config.network.rpc_url);
    info!("  Account: {}", config.watch.account);
    info!("  Contract: {}", config.watch.contract);
    info!("  Storage: {:?}", config.storage.backend);

    Ok(config)
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("transferwatch=debug,transferwatch_indexer=debug,sqlx=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "transferwatch={0},transferwatch_indexer={0}",
                logging.level
            ))
        })
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
    };

    result.context("Failed to initialize logging")
}

fn connect(config: &Config) -> Result<Arc<dyn ChainClient>> {
    let provider = RpcProvider::new(&config.network.rpc_url, config.rpc_timeout())
        .context("Failed to create RPC provider")?;
    info!("RPC provider initialized");
    Ok(Arc::new(provider))
}

/// Main service - backfill then live polling
async fn run_indexer(config: Config) -> Result<()> {
    let watch = config.watch_config()?;
    let stores = Stores::open(&config.storage)
        .await
        .context("Failed to open storage")?;
    let client = connect(&config)?;

    let engine = SyncEngine::new(client, stores.clone(), watch);
    let sync_handle = tokio::spawn(async move { engine.run().await });

    info!("Sync engine started. Press Ctrl+C to stop.");

    tokio::select! {
        result = sync_handle => {
            stores.close().await;
            match result {
                Ok(Ok(())) => {
                    warn!("Sync engine exited unexpectedly");
                    Ok(())
                }
                Ok(Err(e)) => Err(e).context("Sync engine failed"),
                Err(e) => Err(anyhow::anyhow!("Sync task panicked: {}", e)),
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received shutdown signal, shutting down...");
            stores.close().await;
            Ok(())
        }
    }
}

/// One-shot historical backfill
async fn run_backfill(config: Config) -> Result<()> {
    let watch = config.watch_config()?;
    let stores = Stores::open(&config.storage)
        .await
        .context("Failed to open storage")?;
    let client = connect(&config)?;

    let engine = SyncEngine::new(client, stores.clone(), watch);
    let result = engine.backfill().await;
    stores.close().await;

    let head = result.context("Historical backfill failed")?;
    info!("Backfill finished at block {}", head);

    Ok(())
}

/// Show checkpoint, chain lag and the most recent records
async fn show_status(config: Config) -> Result<()> {
    let stores = Stores::open(&config.storage)
        .await
        .context("Failed to open storage")?;

    let checkpoint = stores.checkpoint.load().await;
    let records = stores.records.load_all().await;

    let head = match connect(&config) {
        Ok(client) => match client.current_height().await {
            Ok(head) => Some(head),
            Err(e) => {
                warn!("Could not query chain head: {:#}", e);
                None
            }
        },
        Err(e) => {
            warn!("Could not connect to RPC: {:#}", e);
            None
        }
    };

    println!("\n=== Transferwatch Status ===\n");
    println!("Watch:");
    println!("  Account: {}", config.watch.account);
    println!("  Contract: {}", config.watch.contract);
    println!("  Asset IDs: {}", config.watch_set()?);

    println!("\nSync Progress:");
    println!("  Checkpoint: {}", checkpoint);
    match head {
        Some(head) => {
            println!("  Chain Head: {}", head);
            println!("  Lag: {} blocks", head.saturating_sub(checkpoint));
        }
        None => println!("  Chain Head: unavailable"),
    }

    println!("\nRecords:");
    println!("  Total: {}", records.len());
    if records.is_empty() {
        println!("  No transfers recorded yet.");
    }
    for record in records.iter().take(5) {
        println!(
            "  {}  block {}  tx {}  ids {:?}  total {}",
            record.time,
            record.block_number,
            record.tx_hash,
            record.asset_ids(),
            record.total_amount
        );
    }

    println!();

    stores.close().await;

    Ok(())
}

/// Initialize the database
async fn init_database(database_url: &str) -> Result<()> {
    info!("Initializing database: {}", database_url);

    let storage = Storage::new(database_url)
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
    info!("  Transfers: {}", stats.transfer_count);
    info!("  Entries: {}", stats.entry_count);
    info!("  Last block: {}", stats.last_block_number);

    storage.close().await;

    Ok(())
}
