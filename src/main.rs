//! # catalog-ingest CLI
//!
//! The `catalog-ingest` binary loads a flat-text product catalog into
//! SQLite.
//!
//! ## Usage
//!
//! ```bash
//! catalog-ingest --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog-ingest init` | Create the SQLite database and schema |
//! | `catalog-ingest load <FILE>` | Load a corpus file |
//! | `catalog-ingest stats` | Print row counts and database size |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! catalog-ingest init
//!
//! # Load with eight workers and sixteen partitions
//! catalog-ingest load amazon-meta.txt --workers 8 --partitions 16
//!
//! # Show the partition plan without writing anything
//! catalog-ingest load amazon-meta.txt --dry-run
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catalog_ingest::config;
use catalog_ingest::ingest::{self, LoadOptions};
use catalog_ingest::migrate;
use catalog_ingest::progress::ProgressMode;
use catalog_ingest::stats;

/// Bulk loader for a flat-text product catalog.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "catalog-ingest",
    about = "Bulk loader for a flat-text product catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/catalog.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables (products,
    /// categories, product_categories, similar_products, reviews).
    /// Running it more than once is safe.
    Init,

    /// Load a corpus file.
    ///
    /// Splits the file into block-aligned partitions, upserts every
    /// product, then loads categories, reviews and similar-product links.
    /// Re-running over the same file leaves the database unchanged.
    Load {
        /// Corpus file to load.
        input: PathBuf,

        /// Worker pool size. Defaults to `[ingest].workers`.
        #[arg(long)]
        workers: Option<usize>,

        /// Number of partitions. Defaults to `[ingest].partitions`, then the worker count.
        #[arg(long)]
        partitions: Option<usize>,

        /// Rows per batch write. Defaults to `[ingest].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Dry run: print the partition plan and record counts without writing.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Show row counts per table and database size.
    Stats,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "catalog_ingest=debug"
    } else {
        "catalog_ingest=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load {
            input,
            workers,
            partitions,
            batch_size,
            dry_run,
            progress,
        } => {
            let opts = LoadOptions {
                workers,
                partitions,
                batch_size,
                dry_run,
                progress: ProgressMode::parse(&progress)?,
            };
            ingest::run_load(&cfg, &input, opts).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
