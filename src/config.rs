//! TOML configuration.
//!
//! Connection and ingestion parameters are read once at startup and passed
//! explicitly to [`db::connect`](crate::db::connect) and the
//! [`Ingestor`](crate::ingest::Ingestor). Nothing here is global.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    8
}
fn default_busy_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Worker pool size. Defaults to the available parallelism minus two.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Number of corpus partitions. Defaults to the worker count.
    #[serde(default)]
    pub partitions: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: None,
            partitions: None,
        }
    }
}

fn default_batch_size() -> usize {
    10_000
}

impl IngestConfig {
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }

    pub fn partitions(&self) -> usize {
        self.partitions.unwrap_or_else(|| self.workers())
    }
}

/// Hardware parallelism with two cores left for the database and the
/// runtime's own threads.
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(2).max(1)
}

impl Config {
    /// Defaults used when no configuration file exists.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/catalog.sqlite"),
                max_connections: default_max_connections(),
                busy_timeout_secs: default_busy_timeout_secs(),
            },
            ingest: IngestConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.db.max_connections == 0 {
            anyhow::bail!("db.max_connections must be >= 1");
        }
        if self.ingest.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be > 0");
        }
        if self.ingest.workers == Some(0) {
            anyhow::bail!("ingest.workers must be >= 1");
        }
        if self.ingest.partitions == Some(0) {
            anyhow::bail!("ingest.partitions must be >= 1");
        }
        Ok(())
    }
}

/// Read and validate the configuration at `path`.
///
/// A missing file is not an error: [`Config::minimal`] is used instead.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
