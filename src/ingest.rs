//! Ingestion pipeline orchestration.
//!
//! Coordinates a full load: corpus → partitions → per-partition sinks →
//! batch writers → store. Runs in two phases with a barrier between them:
//!
//! 1. **products**: one [`ProductSink`] per partition upserts every
//!    complete product definition.
//! 2. **relations**: category, review and similarity sinks run
//!    concurrently, each across all partitions. References to products
//!    that phase 1 did not create become placeholders.
//!
//! All tasks of both phases share one [`WorkerPool`]. A failed task never
//! cancels its siblings: the phase is drained first and then reported as
//! one [`IngestError::PhaseFailed`]. Phase 2 never starts after a failed
//! phase 1.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;

use crate::categories::CategorySink;
use crate::config::Config;
use crate::corpus::Corpus;
use crate::error::{IngestError, Phase, Result};
use crate::migrate;
use crate::models::EntityKind;
use crate::parse::{blocks, Record};
use crate::partition::{self, Partition};
use crate::pool::WorkerPool;
use crate::progress::{NoProgress, ProgressEvent, ProgressMode, ProgressReporter};
use crate::reviews::ReviewSink;
use crate::similar::SimilarityResolver;
use crate::sink::{drain, ProductSink, RecordSink, TaskReport};
use crate::store::{SqliteStore, Store};
use crate::writer::WriteStats;

/// One pipeline that runs once per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Products,
    Categories,
    Reviews,
    Similarity,
}

impl TaskKind {
    /// Pipelines of the second phase.
    pub const RELATIONS: [TaskKind; 3] =
        [TaskKind::Categories, TaskKind::Reviews, TaskKind::Similarity];

    pub fn phase(self) -> Phase {
        match self {
            TaskKind::Products => Phase::Products,
            _ => Phase::Relations,
        }
    }

    fn sink(self, store: Arc<dyn Store>, batch_size: usize) -> Box<dyn RecordSink> {
        match self {
            TaskKind::Products => Box::new(ProductSink::new(store, batch_size)),
            TaskKind::Categories => Box::new(CategorySink::new(store, batch_size)),
            TaskKind::Reviews => Box::new(ReviewSink::new(store, batch_size)),
            TaskKind::Similarity => Box::new(SimilarityResolver::new(store, batch_size)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub partitions: usize,
}

/// Outcome of a successful load.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub partitions: usize,
    /// Record blocks in the corpus.
    pub records: u64,
    /// Records without a complete product definition.
    pub incomplete: u64,
    pub writes: BTreeMap<EntityKind, WriteStats>,
    pub elapsed: Duration,
}

impl IngestSummary {
    pub fn rows(&self, kind: EntityKind) -> u64 {
        self.writes.get(&kind).map(|w| w.rows).unwrap_or(0)
    }
}

pub struct Ingestor {
    store: Arc<dyn Store>,
    pool: WorkerPool,
    settings: IngestSettings,
    progress: Arc<dyn ProgressReporter>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, pool: WorkerPool, settings: IngestSettings) -> Self {
        Self {
            store,
            pool,
            settings,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, corpus: Arc<Corpus>) -> Result<IngestSummary> {
        let started = Instant::now();
        let parts = partition::split(corpus.text(), self.settings.partitions);
        tracing::info!(
            partitions = parts.len(),
            records = parts.iter().map(|p| p.records).sum::<usize>(),
            workers = self.pool.size(),
            batch_size = self.settings.batch_size,
            "partition plan ready"
        );

        let products = self
            .run_phase(Phase::Products, &[TaskKind::Products], &corpus, &parts)
            .await?;
        let relations = self
            .run_phase(Phase::Relations, &TaskKind::RELATIONS, &corpus, &parts)
            .await?;

        let mut writes: BTreeMap<EntityKind, WriteStats> = BTreeMap::new();
        for report in products.iter().chain(relations.iter()) {
            for w in &report.writes {
                writes
                    .entry(w.kind)
                    .or_insert_with(|| WriteStats::new(w.kind))
                    .merge(w);
            }
        }

        Ok(IngestSummary {
            partitions: parts.len(),
            records: products.iter().map(|r| r.records).sum(),
            incomplete: products.iter().map(|r| r.skipped).sum(),
            writes,
            elapsed: started.elapsed(),
        })
    }

    async fn run_phase(
        &self,
        phase: Phase,
        kinds: &[TaskKind],
        corpus: &Arc<Corpus>,
        parts: &[Partition],
    ) -> Result<Vec<TaskReport>> {
        let started = Instant::now();
        let mut jobs = Vec::with_capacity(kinds.len() * parts.len());
        for &kind in kinds {
            for part in parts {
                let corpus = corpus.clone();
                let store = self.store.clone();
                let progress = self.progress.clone();
                let range = part.range.clone();
                let index = part.index;
                let batch_size = self.settings.batch_size;
                jobs.push(async move {
                    let sink = kind.sink(store, batch_size);
                    let task = sink.name();
                    let text = &corpus.text()[range];
                    let report = drain(text, sink).await.map_err(|e| IngestError::Task {
                        partition: index,
                        task,
                        source: Box::new(e),
                    })?;
                    tracing::debug!(
                        %phase,
                        task,
                        partition = index,
                        records = report.records,
                        rows = report.rows(),
                        "task finished"
                    );
                    progress.report(ProgressEvent::TaskFinished {
                        phase,
                        task,
                        partition: index,
                        rows: report.rows(),
                    });
                    Ok::<_, IngestError>(report)
                });
            }
        }

        let total = jobs.len();
        tracing::info!(%phase, tasks = total, "phase started");
        self.progress
            .report(ProgressEvent::PhaseStarted { phase, tasks: total });

        let mut reports = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for result in self.pool.run_all(jobs).await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(%phase, error = %e, "task failed");
                    failures.push(e);
                }
            }
        }

        let elapsed = started.elapsed();
        self.progress
            .report(ProgressEvent::PhaseFinished { phase, elapsed });

        if !failures.is_empty() {
            return Err(IngestError::PhaseFailed {
                phase,
                total,
                failures,
            });
        }
        tracing::info!(%phase, elapsed_ms = elapsed.as_millis() as u64, "phase finished");
        Ok(reports)
    }
}

/// Per-partition counts for a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    pub partition: Partition,
    /// Records with all four required product fields.
    pub complete: usize,
}

/// Split and parse without touching any store.
pub fn plan(text: &str, partitions: usize) -> Vec<PartitionPlan> {
    partition::split(text, partitions)
        .into_iter()
        .map(|partition| {
            let complete = blocks(partition.text(text))
                .filter(|b| b.is_record())
                .filter(|b| Record::parse(b.text).product().is_some())
                .count();
            PartitionPlan {
                partition,
                complete,
            }
        })
        .collect()
}

/// Options for `catalog-ingest load`. `None` falls back to the config file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub workers: Option<usize>,
    pub partitions: Option<usize>,
    pub batch_size: Option<usize>,
    pub dry_run: bool,
    pub progress: ProgressMode,
}

pub async fn run_load(config: &Config, input: &Path, opts: LoadOptions) -> anyhow::Result<()> {
    let workers = opts.workers.unwrap_or_else(|| config.ingest.workers());
    let partitions = opts
        .partitions
        .or(config.ingest.partitions)
        .unwrap_or(workers);
    let batch_size = opts.batch_size.unwrap_or(config.ingest.batch_size);
    if workers == 0 || partitions == 0 || batch_size == 0 {
        bail!("--workers, --partitions and --batch-size must all be >= 1");
    }

    let corpus = Corpus::open(input)?;

    if opts.dry_run {
        let plans = plan(corpus.text(), partitions);
        let records: usize = plans.iter().map(|p| p.partition.records).sum();
        let complete: usize = plans.iter().map(|p| p.complete).sum();
        println!("load {} (dry-run)", input.display());
        println!("  bytes: {}", corpus.len());
        println!("  partitions: {}", plans.len());
        for p in &plans {
            println!(
                "    #{}  {} records  {} complete",
                p.partition.index, p.partition.records, p.complete
            );
        }
        println!("  records: {}", records);
        println!("  complete products: {}", complete);
        return Ok(());
    }

    let store = SqliteStore::connect(config).await?;
    migrate::create_schema(store.pool()).await?;

    let progress: Arc<dyn ProgressReporter> = Arc::from(opts.progress.reporter());
    let ingestor = Ingestor::new(
        Arc::new(store.clone()),
        WorkerPool::new(workers),
        IngestSettings {
            batch_size,
            partitions,
        },
    )
    .with_progress(progress);

    let result = ingestor.run(Arc::new(corpus)).await;
    store.close().await;

    let summary = match result {
        Ok(summary) => summary,
        Err(IngestError::PhaseFailed {
            phase,
            total,
            failures,
        }) => {
            bail!(
                "load failed: {} of {} {} tasks failed; rows from finished batches were kept, re-run to complete",
                failures.len(),
                total,
                phase
            );
        }
        Err(e) => return Err(e.into()),
    };

    println!("load {}", input.display());
    println!("  partitions: {}", summary.partitions);
    println!("  records: {}", summary.records);
    println!("  incomplete records: {}", summary.incomplete);
    println!("  products upserted: {}", summary.rows(EntityKind::Product));
    for (kind, w) in &summary.writes {
        if *kind == EntityKind::Product {
            continue;
        }
        println!("  {} rows: {} ({} new)", kind, w.rows, w.changed);
    }
    println!("  elapsed: {:.2}s", summary.elapsed.as_secs_f64());
    println!("ok");

    Ok(())
}
