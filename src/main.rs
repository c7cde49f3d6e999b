//! Menu-Atlas main entry point
//!
//! This is the command-line interface for the Menu-Atlas crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use menu_atlas::config::{load_config_with_hash, validate, Config, WorkerOverrides};
use menu_atlas::crawler::{Command, Coordinator, Shutdown};
use menu_atlas::output::print_statistics;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Menu-Atlas: a resumable store directory and catalog crawler
///
/// Walks a store locator (region → sub-region → store), crawls every store's
/// catalog and unions the prices into `menu.csv`. Every finished unit of work
/// is checkpointed; rerunning a command continues where it stopped.
#[derive(Parser, Debug)]
#[command(name = "menu-atlas")]
#[command(version)]
#[command(about = "A resumable store directory and catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Work on at most N pending items per stage
    #[arg(long, value_name = "N", global = true)]
    limit: Option<usize>,

    /// Concurrent workers for the directory stages
    #[arg(long, value_name = "N", global = true)]
    directory_workers: Option<usize>,

    /// Stores crawled concurrently
    #[arg(long, value_name = "N", global = true)]
    store_workers: Option<usize>,

    /// Category sessions shared by all in-flight stores
    #[arg(long, value_name = "N", global = true)]
    category_workers: Option<usize>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum CliCommand {
    /// Read region pages into sub-region lists
    Regions,
    /// Read sub-region pages into store links
    SubRegions,
    /// Resolve store pages into store ids and coordinates
    Stores,
    /// Run all directory stages
    Directory,
    /// Crawl the catalogs of resolved stores and merge them into the table
    Catalog,
    /// Directory, catalog and location export
    All,
    /// Merge every persisted menu into the table
    RebuildTable,
    /// Write per-region location files and the combined store list
    ExportLocations,
    /// Show checkpoint counts, the last run and items left to retry
    Status,
}

impl CliCommand {
    fn command(self) -> Option<Command> {
        match self {
            Self::Regions => Some(Command::Regions),
            Self::SubRegions => Some(Command::SubRegions),
            Self::Stores => Some(Command::Stores),
            Self::Directory => Some(Command::Directory),
            Self::Catalog => Some(Command::Catalog),
            Self::All => Some(Command::All),
            Self::RebuildTable => Some(Command::RebuildTable),
            Self::ExportLocations => Some(Command::ExportLocations),
            Self::Status => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = load(&cli)?;
    config.crawler.apply_overrides(&WorkerOverrides {
        directory_workers: cli.directory_workers,
        store_workers: cli.store_workers,
        category_workers: cli.category_workers,
    });
    validate(&config).context("Invalid worker override")?;

    let shutdown = Shutdown::new();
    let mut coordinator = Coordinator::from_config(config, shutdown.clone())
        .context("Cannot open data directory")?
        .with_limit(cli.limit);

    let Some(command) = cli.command.command() else {
        let stats = coordinator.status()?;
        print_statistics(&stats);
        return Ok(());
    };

    spawn_interrupt_handler(shutdown);

    coordinator.begin_run(&config_hash, command)?;
    let result = coordinator.execute(command).await;
    let status = coordinator.finish(&result)?;

    match result {
        Ok(()) => {
            tracing::info!("{} {}", command.name(), status.to_db_string());
            Ok(())
        }
        Err(e) => {
            tracing::error!("{} failed: {}", command.name(), e);
            Err(e.into())
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<(Config, String)> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok((config, hash))
}

/// Forwards Ctrl-C to the shutdown state: once to drain, twice to abort
fn spawn_interrupt_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            shutdown.signal();
            if shutdown.is_aborted() {
                break;
            }
        }
    });
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("menu_atlas=info,warn"),
            1 => EnvFilter::new("menu_atlas=debug,info"),
            2 => EnvFilter::new("menu_atlas=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
